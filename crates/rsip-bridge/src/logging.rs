//! Opt-in log output.
//!
//! The bridge only emits `tracing` events. Hosts that already install a
//! subscriber get them for free; standalone hosts (the C ABI, test programs)
//! can call [`setup_logging`] once.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// What [`setup_logging`] installs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Minimum level for bridge events
    pub level: Level,
    /// One JSON object per line, for hosts that ship logs to a collector
    pub json: bool,
    /// Include source file and line
    pub file_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            json: false,
            file_info: false,
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Level) -> Self {
        LoggingConfig {
            level,
            ..Default::default()
        }
    }

    /// Parse `level` (see [`parse_log_level`]) into a plain-text configuration
    pub fn from_level_str(level: &str) -> Result<Self> {
        parse_log_level(level).map(Self::new)
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn with_file_info(mut self, file_info: bool) -> Self {
        self.file_info = file_info;
        self
    }
}

/// Install a global fmt subscriber. `RUST_LOG` directives are honored on top
/// of `config.level`; thread names are always shown so listener threads
/// (`TransportConfig::thread_name`) can be told apart. Fails if a global
/// subscriber is already set.
pub fn setup_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| Error::config(format!("logging already initialized: {}", e)))
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level.trim()).map_err(|_| Error::config(format!("Invalid log level: {}", level)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level(" WARN ").unwrap(), Level::WARN);
        assert!(matches!(parse_log_level("loud"), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_from_level_str() {
        let config = LoggingConfig::from_level_str("trace")
            .unwrap()
            .with_json(true)
            .with_file_info(true);
        assert_eq!(config.level, Level::TRACE);
        assert!(config.json);
        assert!(config.file_info);

        assert_eq!(LoggingConfig::from_level_str("info").unwrap(), LoggingConfig::default());
        assert!(LoggingConfig::from_level_str("loud").is_err());
    }
}
