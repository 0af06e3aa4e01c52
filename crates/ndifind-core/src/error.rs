//! Error types shared by the ndifind crates.
//!
//! Configuration problems are reported through [`ConfigError`]; everything else
//! a caller of the core crate can hit is wrapped in [`NdiFindError`].

use thiserror::Error;

/// Result type alias using NdiFindError as the error type.
pub type Result<T> = std::result::Result<T, NdiFindError>;

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum NdiFindError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Logging could not be initialised
    #[error("Logging initialisation failed: {0}")]
    Logging(String),
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {reason}")]
    InvalidFormat { reason: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns the offending field, if the error is tied to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidValue { field, .. } => Some(field),
            _ => None,
        }
    }
}
