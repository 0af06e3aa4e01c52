//! Error types for the discovery engine

use ndifind_core::ConfigError;
use thiserror::Error;

/// Result type alias for discovery operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors that can occur during source discovery
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The discovery backend could not open a session
    #[error("Discovery backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A backend call failed
    #[error("Backend {operation} failed: {reason}")]
    Backend {
        operation: &'static str,
        reason: String,
    },

    /// Invalid finder configuration
    #[error("Invalid finder configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// The finder has been closed
    #[error("Finder has been closed")]
    Closed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DiscoveryError {
    /// Creates a backend call error.
    pub fn backend(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Backend {
            operation,
            reason: reason.into(),
        }
    }
}
