//! Structured logging for Pulse
//!
//! Installs a global `tracing` subscriber with JSONL or pretty console
//! output and optional rolling JSONL files.
//!
//! # Features
//!
//! - **JSONL Output**: Structured JSON lines for log aggregation (default)
//! - **Pretty Output**: Human-readable console output for development
//! - **File Rotation**: Daily/hourly log rotation via tracing-appender
//! - **Filtering**: `RUST_LOG` overrides, otherwise the configured level
//!   plus per-target directives
//!
//! # Quick Start
//!
//! ```ignore
//! use pulse_logging::{LogConfig, PulseSubscriberBuilder};
//!
//! // JSONL to console
//! PulseSubscriberBuilder::new().init();
//!
//! // Keep the guard alive so buffered file writes are flushed
//! let _guard = PulseSubscriberBuilder::new()
//!     .with_config(LogConfig::production("/var/log/pulse".into()))
//!     .try_init()?;
//! ```

pub mod config;

pub use config::{ConsoleConfig, FileConfig, FilterConfig, JsonlConfig, LogConfig, RotationStrategy};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    /// A global subscriber is already installed
    #[error("Global subscriber already initialized: {0}")]
    AlreadyInitialized(String),

    /// Log file or directory could not be created
    #[error("I/O error: {0}")]
    Io(String),

    /// Invalid configuration or filter directive
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for LoggingError {
    fn from(e: std::io::Error) -> Self {
        LoggingError::Io(e.to_string())
    }
}

type BoxedLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

/// Builder for configuring and initializing the Pulse logging subscriber
///
/// By default, console output uses JSONL format. Use
/// [`LogConfig::development()`] for human-readable output.
pub struct PulseSubscriberBuilder {
    config: LogConfig,
}

impl PulseSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Initialize the subscriber globally
    ///
    /// Returns a guard that must be kept alive for file output to flush.
    ///
    /// # Panics
    ///
    /// Panics if a global subscriber has already been set or the file
    /// output cannot be opened.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => panic!("Failed to initialize logging: {}", e),
        }
    }

    /// Try to initialize the subscriber globally
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let filter = self.env_filter()?;
        let (layers, guard) = self.build_layers()?;
        Registry::default()
            .with(filter)
            .with(layers)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
        Ok(guard)
    }

    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(self.config.filter_directives())
                .map_err(|e| LoggingError::Config(e.to_string())),
        }
    }

    fn build_layers(&self) -> Result<(Vec<BoxedLayer>, Option<WorkerGuard>), LoggingError> {
        let jsonl = &self.config.jsonl;
        let mut layers: Vec<BoxedLayer> = Vec::new();

        if self.config.console.enabled {
            let layer: BoxedLayer = if self.config.console.pretty {
                tracing_subscriber::fmt::layer()
                    .with_ansi(self.config.console.ansi)
                    .with_target(true)
                    .with_thread_ids(jsonl.include_thread_info)
                    .boxed()
            } else {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(jsonl.include_current_span)
                    .with_span_list(jsonl.include_spans)
                    .flatten_event(jsonl.flatten_events)
                    .with_thread_ids(jsonl.include_thread_info)
                    .with_file(jsonl.include_location)
                    .with_line_number(jsonl.include_location)
                    .boxed()
            };
            layers.push(layer);
        }

        let mut guard = None;
        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = file_writer(file_config)?;
            guard = Some(file_guard);
            layers.push(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(jsonl.include_current_span)
                    .with_span_list(jsonl.include_spans)
                    .flatten_event(jsonl.flatten_events)
                    .with_thread_ids(jsonl.include_thread_info)
                    .with_file(jsonl.include_location)
                    .with_line_number(jsonl.include_location)
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
            );
        }

        Ok((layers, guard))
    }
}

impl Default for PulseSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Open the non-blocking writer for file output
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&config.directory)?;

    let rotation = match config.rotation {
        RotationStrategy::Never => {
            // Single file, truncated on start
            let path = config.directory.join(format!("{}.log", config.prefix));
            return Ok(tracing_appender::non_blocking(File::create(path)?));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(config.prefix.as_str())
        .filename_suffix("log");
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }
    let appender = builder
        .build(&config.directory)
        .map_err(|e| LoggingError::Io(e.to_string()))?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() -> Result<Option<WorkerGuard>, LoggingError> {
    PulseSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .try_init()
}

/// Initialize logging for tests; a no-op if a subscriber already exists
pub fn init_testing() {
    let _ = PulseSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
