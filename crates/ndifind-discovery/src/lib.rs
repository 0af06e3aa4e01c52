//! NDI source discovery engine
//!
//! This crate keeps a live view of the NDI sources reachable from this
//! machine:
//! - Poll a discovery backend from a dedicated worker thread
//! - Publish an immutable [`Snapshot`] of the known sources after each change
//! - Notify listeners when sources are found or lost
//! - Stream the same events to async consumers
//!
//! # Architecture
//!
//! The [`Finder`] opens one session on a [`DiscoveryBackend`] and runs one
//! worker that repeatedly:
//! 1. Waits (at most 500ms) for the backend to signal a possible change
//! 2. Fetches the backend's current source list and builds a new snapshot
//! 3. Fires found callbacks, then lost callbacks, against the previous snapshot
//! 4. Atomically swaps in the new snapshot for readers
//!
//! Two backends ship with the crate: [`MdnsBackend`] browses `_ndi._tcp`
//! services with `mdns-sd`, and [`MemoryBackend`] serves a source list set
//! in process.
//!
//! # Example
//!
//! ```
//! use ndifind_core::FinderConfig;
//! use ndifind_discovery::{Finder, MemoryBackend, RawSource};
//!
//! let backend = MemoryBackend::new();
//! backend.set_sources(vec![RawSource::new("STUDIO-PC (Camera 1)", "192.168.1.20:5961")]);
//!
//! let finder = Finder::with_backend(FinderConfig::default(), &backend)?;
//! # let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
//! # while finder.sources().is_empty() && std::time::Instant::now() < deadline {
//! #     std::thread::sleep(std::time::Duration::from_millis(10));
//! # }
//! assert_eq!(finder.sources()[0].stream_name(), Some("Camera 1"));
//!
//! finder.close();
//! # Ok::<(), ndifind_discovery::DiscoveryError>(())
//! ```

pub mod backend;
pub mod error;
pub mod finder;
pub mod listeners;
pub mod snapshot;
pub mod types;

pub use backend::{
    BackendSession, BackendSettings, DiscoveryBackend, MdnsBackend, MemoryBackend, SessionGuard,
};
pub use error::{DiscoveryError, Result};
pub use finder::{Finder, WAIT_TIMEOUT};
pub use listeners::ListenerId;
pub use snapshot::{Snapshot, SnapshotDiff};
pub use types::{RawSource, Source, SourceEvent, SourceEventKind};
