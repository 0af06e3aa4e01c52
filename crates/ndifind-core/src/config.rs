//! Configuration management for ndifind.
//!
//! This module provides:
//! - [`FinderConfig`], the immutable settings of one discovery session
//! - [`LoggingConfig`], the tracing subscriber settings used by the CLI
//! - [`AppConfig`], loadable from YAML files with environment overrides

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::Level;

/// Delimiter used when group and address lists are handed to a backend.
pub const LIST_DELIMITER: char = ',';

/// Settings for one discovery session.
///
/// The engine clones this value at construction and never mutates it, so a
/// running finder always reflects the configuration it was created with.
///
/// # Examples
///
/// ```
/// use ndifind_core::FinderConfig;
///
/// let config = FinderConfig::default().with_extra_ips(["12.0.0.8", "13.0.12.8"]);
/// assert_eq!(config.joined_extra_ips().as_deref(), Some("12.0.0.8,13.0.12.8"));
/// assert_eq!(config.joined_groups(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinderConfig {
    /// Report sources running on this machine
    #[serde(default)]
    pub show_local_sources: bool,

    /// Only report sources announced in these groups (backend default when unset)
    #[serde(default)]
    pub groups: Option<Vec<String>>,

    /// Additional remote hosts to query for sources that are not visible
    /// through multicast discovery
    #[serde(default)]
    pub extra_ips: Option<Vec<String>>,

    /// Capacity of each async event subscription
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            show_local_sources: false,
            groups: None,
            extra_ips: None,
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_event_buffer() -> usize {
    256
}

impl FinderConfig {
    /// Sets whether sources on the local machine are reported.
    pub fn with_local_sources(mut self, show: bool) -> Self {
        self.show_local_sources = show;
        self
    }

    /// Restricts discovery to the given groups.
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    /// Adds remote hosts to query in addition to the local network.
    pub fn with_extra_ips<I, S>(mut self, ips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_ips = Some(ips.into_iter().map(Into::into).collect());
        self
    }

    /// Groups joined with [`LIST_DELIMITER`], or `None` when no group list
    /// was supplied. An explicitly empty list joins to an empty string.
    pub fn joined_groups(&self) -> Option<String> {
        join_list(self.groups.as_deref())
    }

    /// Extra addresses joined with [`LIST_DELIMITER`], or `None` when no
    /// address list was supplied.
    pub fn joined_extra_ips(&self) -> Option<String> {
        join_list(self.extra_ips.as_deref())
    }

    /// Validates the configuration.
    ///
    /// List entries are joined into a single delimited string for the
    /// backend, so an entry must be non-empty and may not contain the
    /// delimiter. Entries are otherwise passed through untouched.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        validate_list("finder.groups", self.groups.as_deref())?;
        validate_list("finder.extra_ips", self.extra_ips.as_deref())?;

        if self.event_buffer == 0 {
            return Err(ConfigError::invalid_value(
                "finder.event_buffer",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn join_list(items: Option<&[String]>) -> Option<String> {
    items.map(|items| {
        let mut joined = String::new();
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                joined.push(LIST_DELIMITER);
            }
            joined.push_str(item);
        }
        joined
    })
}

fn validate_list(field: &str, items: Option<&[String]>) -> std::result::Result<(), ConfigError> {
    for item in items.unwrap_or_default() {
        if item.is_empty() {
            return Err(ConfigError::invalid_value(field, "entries must not be empty"));
        }
        if item.contains(LIST_DELIMITER) {
            return Err(ConfigError::invalid_value(
                field,
                format!("entry '{}' contains the list delimiter '{}'", item, LIST_DELIMITER),
            ));
        }
    }
    Ok(())
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Whether to include file/line info
    #[serde(default)]
    pub file_line: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file_line: false,
        }
    }
}

impl LoggingConfig {
    /// Parses the log level string to a tracing Level.
    pub fn parse_level(&self) -> Result<Level> {
        self.level.parse().map_err(|_| {
            ConfigError::invalid_value("logging.level", format!("Invalid log level: {}", self.level))
                .into()
        })
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON format for structured logging
    Json,
}

/// Root configuration of the `ndifind` tool.
///
/// # Examples
///
/// ```no_run
/// use ndifind_core::AppConfig;
///
/// let config = AppConfig::from_config_builder("ndifind.yaml").unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Discovery session settings
    #[serde(default)]
    pub finder: FinderConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_yaml(&contents)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Loads configuration using the `config` crate: the file at `path`
    /// overridden by `NDIFIND__*` environment variables, for example
    /// `NDIFIND__FINDER__SHOW_LOCAL_SOURCES=true` or
    /// `NDIFIND__FINDER__GROUPS=public,studio-b`.
    pub fn from_config_builder<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .add_source(
                config::Environment::with_prefix("NDIFIND")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("finder.groups")
                    .with_list_parse_key("finder.extra_ips")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        config.try_deserialize().map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<()> {
        self.finder.validate()?;
        self.logging.parse_level()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(!config.finder.show_local_sources);
        assert_eq!(config.finder.groups, None);
        assert_eq!(config.finder.extra_ips, None);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_join_absent_lists() {
        let config = FinderConfig::default();
        assert_eq!(config.joined_groups(), None);
        assert_eq!(config.joined_extra_ips(), None);
    }

    #[test]
    fn test_join_uses_comma_delimiter() {
        let config = FinderConfig::default()
            .with_groups(["public", "studio-b"])
            .with_extra_ips(["12.0.0.8"]);
        assert_eq!(config.joined_groups().as_deref(), Some("public,studio-b"));
        assert_eq!(config.joined_extra_ips().as_deref(), Some("12.0.0.8"));
    }

    #[test]
    fn test_join_explicit_empty_list() {
        let config = FinderConfig::default().with_groups(Vec::<String>::new());
        assert_eq!(config.joined_groups().as_deref(), Some(""));
    }

    #[test]
    fn test_validation_rejects_delimiter() {
        let config = FinderConfig::default().with_groups(["a,b"]);
        let err = config.validate().unwrap_err();
        assert_eq!(err.field(), Some("finder.groups"));
    }

    #[test]
    fn test_validation_rejects_empty_entry() {
        assert!(FinderConfig::default().with_extra_ips([""]).validate().is_err());
    }

    #[test]
    fn test_entries_with_spaces_pass_through() {
        let config = FinderConfig::default().with_groups(["Studio B", " public"]);
        assert!(config.validate().is_ok());
        assert_eq!(config.joined_groups().as_deref(), Some("Studio B, public"));
    }

    #[test]
    fn test_validation_rejects_zero_buffer() {
        let config = FinderConfig {
            event_buffer: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
finder:
  show_local_sources: true
  groups: [public, studio-b]
logging:
  level: debug
  format: json
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert!(config.finder.show_local_sources);
        assert_eq!(
            config.finder.groups,
            Some(vec!["public".to_string(), "studio-b".to_string()])
        );
        assert_eq!(config.finder.extra_ips, None);
        assert_eq!(config.finder.event_buffer, 256);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.parse_level().unwrap(), Level::DEBUG);
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "finder:\n  extra_ips: [\"12.0.0.8\", \"13.0.12.8\"]").unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config.finder.joined_extra_ips().as_deref(),
            Some("12.0.0.8,13.0.12.8")
        );

        let built = AppConfig::from_config_builder(file.path()).unwrap();
        assert_eq!(built.finder.extra_ips, config.finder.extra_ips);
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_file("/nonexistent/ndifind.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to load configuration"));
    }

    #[test]
    fn test_logging_parse_level() {
        let logging = LoggingConfig {
            level: "loud".to_string(),
            ..Default::default()
        };
        assert!(logging.parse_level().is_err());
    }
}
