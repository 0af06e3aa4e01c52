//! Tracing subscriber setup.

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{NdiFindError, Result};
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber described by `config`.
///
/// Logs go to stderr so stdout stays free for program output.
/// `RUST_LOG` takes precedence over the configured level when it is set.
/// Fails if the level is invalid or a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let level = config.parse_level()?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(config.file_line)
        .with_line_number(config.file_line)
        .with_thread_names(true)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|e| NdiFindError::Logging(e.to_string()))
}
