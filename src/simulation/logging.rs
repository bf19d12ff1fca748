//! Logging and tracing configuration
//!
//! This module configures the diagnostic `tracing` output of the simulator.
//! It is separate from the audit log, which records what happened to entities.

use std::error::Error;
use std::io;
use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// Result of initializing the global subscriber
pub type LoggingResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for the application
    pub level: Level,
    /// Whether to enable JSON formatting on the console
    pub json_format: bool,
    /// Whether to also log to daily rolling files
    pub log_to_file: bool,
    /// Log file directory (if logging to file)
    pub log_directory: Option<String>,
    /// Log file prefix (if logging to file)
    pub log_file_prefix: String,
    /// Whether to enable span events
    pub enable_span_events: bool,
    /// Whether to enable ansi colors in console output
    pub enable_ansi: bool,
    /// Custom environment filter
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            json_format: false,
            log_to_file: false,
            log_directory: None,
            log_file_prefix: "patient-flow-simulator".to_string(),
            enable_span_events: false,
            enable_ansi: true,
            env_filter: None,
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the log level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Enable JSON formatting
    pub fn with_json_format(mut self) -> Self {
        self.json_format = true;
        self
    }

    /// Enable file logging
    pub fn with_file_logging(mut self, directory: impl Into<String>) -> Self {
        self.log_to_file = true;
        self.log_directory = Some(directory.into());
        self
    }

    /// Set log file prefix
    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.log_file_prefix = prefix.into();
        self
    }

    /// Enable span events
    pub fn with_span_events(mut self) -> Self {
        self.enable_span_events = true;
        self
    }

    /// Disable ANSI colors
    pub fn without_ansi(mut self) -> Self {
        self.enable_ansi = false;
        self
    }

    /// Set custom environment filter
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    fn span_events(&self) -> FmtSpan {
        if self.enable_span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn build_filter(&self) -> LoggingResult<EnvFilter> {
        if let Some(filter) = &self.env_filter {
            return Ok(EnvFilter::try_new(filter)?);
        }
        Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME").replace('-', "_"), self.level))
        }))
    }

    /// Initialize the global tracing subscriber
    ///
    /// When file logging is enabled the returned guard owns the background
    /// writer; keep it alive until the program exits or buffered lines are lost.
    pub fn init(self) -> LoggingResult<Option<WorkerGuard>> {
        let env_filter = self.build_filter()?;

        let (file_layer, guard) = match self.log_directory.as_deref().filter(|_| self.log_to_file) {
            Some(directory) => {
                let appender = rolling::daily(directory, &self.log_file_prefix);
                let (writer, guard) = non_blocking(appender);
                let layer = fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_span_events(self.span_events());
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        let json_console = self.json_format.then(|| {
            fmt::layer().json().with_writer(io::stderr).with_span_events(self.span_events())
        });
        let pretty_console = (!self.json_format).then(|| {
            fmt::layer()
                .pretty()
                .with_writer(io::stderr)
                .with_ansi(self.enable_ansi)
                .with_span_events(self.span_events())
        });

        Registry::default()
            .with(env_filter)
            .with(file_layer)
            .with(json_console)
            .with(pretty_console)
            .try_init()?;

        info!("Logging initialized at level {}", self.level);
        Ok(guard)
    }

    /// Initialize logging for development (pretty console output)
    pub fn init_dev() -> LoggingResult<Option<WorkerGuard>> {
        Self::new().with_level(Level::DEBUG).with_span_events().init()
    }

    /// Initialize logging for testing (minimal output)
    pub fn init_test() -> LoggingResult<Option<WorkerGuard>> {
        Self::new().with_level(Level::WARN).without_ansi().init()
    }

    /// Initialize verbose logging (INFO level)
    pub fn init_verbose() -> LoggingResult<Option<WorkerGuard>> {
        Self::new().with_level(Level::INFO).init()
    }

    /// Initialize debug logging (DEBUG level with span events)
    pub fn init_debug() -> LoggingResult<Option<WorkerGuard>> {
        Self::new().with_level(Level::DEBUG).with_span_events().init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_logging_config_creation() {
        let config = LoggingConfig::new();
        assert_eq!(config.level, Level::WARN);
        assert!(!config.json_format);
        assert!(!config.log_to_file);
        assert!(config.log_directory.is_none());
        assert_eq!(config.log_file_prefix, "patient-flow-simulator");
        assert!(!config.enable_span_events);
        assert!(config.enable_ansi);
        assert!(config.env_filter.is_none());
    }

    #[test]
    fn test_logging_config_builder_pattern() {
        let config = LoggingConfig::new()
            .with_level(Level::DEBUG)
            .with_json_format()
            .with_file_logging("test_logs")
            .with_file_prefix("test_prefix")
            .with_span_events()
            .without_ansi()
            .with_env_filter("debug");

        assert_eq!(config.level, Level::DEBUG);
        assert!(config.json_format);
        assert!(config.log_to_file);
        assert_eq!(config.log_directory, Some("test_logs".to_string()));
        assert_eq!(config.log_file_prefix, "test_prefix");
        assert_eq!(config.span_events(), FmtSpan::NEW | FmtSpan::CLOSE);
        assert!(!config.enable_ansi);
        assert_eq!(config.env_filter, Some("debug".to_string()));
    }

    #[test]
    fn test_invalid_env_filter_is_reported() {
        let result = LoggingConfig::new().with_env_filter("patient_flow_simulator=loudest").init();
        assert!(result.is_err());
    }
}
