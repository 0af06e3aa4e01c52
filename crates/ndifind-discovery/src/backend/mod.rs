//! Discovery backend contract.
//!
//! A backend opens sessions; a session blocks until its source set may have
//! changed and hands out the current raw source list. The engine owns exactly
//! one session per finder and only ever touches it from its worker thread.

pub mod mdns;
pub mod memory;

pub use mdns::MdnsBackend;
pub use memory::MemoryBackend;

use crate::error::Result;
use crate::types::RawSource;
use ndifind_core::FinderConfig;
use std::time::Duration;
use tracing::warn;

/// Settings handed to a backend when a session is opened.
///
/// Group and address lists arrive as single comma-delimited strings. A list
/// that was never supplied is `None`, which is distinct from an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BackendSettings {
    pub show_local_sources: bool,
    pub groups: Option<String>,
    pub extra_ips: Option<String>,
}

impl From<&FinderConfig> for BackendSettings {
    fn from(config: &FinderConfig) -> Self {
        Self {
            show_local_sources: config.show_local_sources,
            groups: config.joined_groups(),
            extra_ips: config.joined_extra_ips(),
        }
    }
}

/// Opens discovery sessions.
pub trait DiscoveryBackend {
    /// Opens a session scoped to `settings`. Failure here is fatal for the
    /// finder being constructed.
    fn open(&self, settings: &BackendSettings) -> Result<Box<dyn BackendSession>>;
}

/// One open discovery session.
pub trait BackendSession: Send {
    /// Blocks for at most `timeout`. Returns `true` when the source set may
    /// have changed and should be fetched again.
    fn wait(&mut self, timeout: Duration) -> Result<bool>;

    /// Returns the current raw source list.
    fn snapshot(&mut self) -> Result<Vec<RawSource>>;

    /// Releases the session. Called at most once.
    fn close(&mut self) -> Result<()>;
}

/// Owns a session and guarantees it is closed exactly once, either through
/// [`SessionGuard::close`] or when the guard is dropped.
pub struct SessionGuard {
    session: Option<Box<dyn BackendSession>>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn BackendSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn wait(&mut self, timeout: Duration) -> Result<bool> {
        match self.session.as_mut() {
            Some(session) => session.wait(timeout),
            None => Err(crate::error::DiscoveryError::Closed),
        }
    }

    pub fn snapshot(&mut self) -> Result<Vec<RawSource>> {
        match self.session.as_mut() {
            Some(session) => session.snapshot(),
            None => Err(crate::error::DiscoveryError::Closed),
        }
    }

    /// Closes the session. Close failures are logged, never returned: the
    /// session counts as released either way.
    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close() {
                warn!(error = %e, "Failed to close discovery session");
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.close();
    }
}
