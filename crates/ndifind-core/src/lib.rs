//! # ndifind core
//!
//! Configuration, error types and logging setup shared by the ndifind
//! discovery engine and its command line front end.
//!
//! - **Configuration**: [`FinderConfig`] describes one discovery session
//!   (local source visibility, group filter, extra remote addresses);
//!   [`AppConfig`] wraps it together with [`LoggingConfig`] and can be loaded
//!   from YAML with `NDIFIND__*` environment overrides.
//! - **Errors**: `thiserror` based [`ConfigError`] and [`NdiFindError`].
//! - **Logging**: [`logging::init`] installs a `tracing-subscriber` formatter.
//!
//! ## Example
//!
//! ```
//! use ndifind_core::FinderConfig;
//!
//! let config = FinderConfig::default()
//!     .with_local_sources(true)
//!     .with_groups(["public", "studio-b"]);
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.joined_groups().as_deref(), Some("public,studio-b"));
//! ```

pub mod config;
pub mod error;
pub mod logging;

pub use config::{AppConfig, FinderConfig, LogFormat, LoggingConfig};
pub use error::{ConfigError, NdiFindError, Result};
