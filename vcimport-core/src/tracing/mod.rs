//! Tracing setup for structured logging
//!
//! The library only emits `tracing` events and spans. Binaries call
//! [`init_tracing`] once at startup to install a `tracing-subscriber`
//! registry with an `EnvFilter` scoped to the `vcimport` crates.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Errors that can occur during tracing initialization
#[derive(Debug, Error)]
pub enum TracingError {
    /// Failed to initialize tracing subscriber
    #[error("Failed to initialize tracing: {0}")]
    InitializationFailed(String),

    /// Tracing already initialized
    #[error("Tracing has already been initialized")]
    AlreadyInitialized,

    /// Failed to create log file
    #[error("Failed to create log file: {0}")]
    FileCreationFailed(String),
}

/// Result type for tracing operations
pub type TracingResult<T> = Result<T, TracingError>;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingLevel {
    /// Errors only
    Error,
    /// Errors and warnings (default)
    #[default]
    Warn,
    /// Pipeline progress
    Info,
    /// State transitions and cache activity
    Debug,
    /// Everything, including remote calls
    Trace,
}

impl TracingLevel {
    /// Converts to tracing crate's Level
    #[must_use]
    pub const fn to_tracing_level(self) -> Level {
        match self {
            Self::Error => Level::ERROR,
            Self::Warn => Level::WARN,
            Self::Info => Level::INFO,
            Self::Debug => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Level selected by `-v` flags on top of `base`, capped at `Trace`
    #[must_use]
    pub const fn raised_by(base: Self, verbosity: u8) -> Self {
        let levels = [Self::Error, Self::Warn, Self::Info, Self::Debug, Self::Trace];
        let index = base as usize + verbosity as usize;
        if index >= levels.len() {
            Self::Trace
        } else {
            levels[index]
        }
    }
}

impl std::str::FromStr for TracingLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for TracingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Output destination for tracing logs
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TracingOutput {
    /// Standard error, keeping stdout for operator messages
    #[default]
    Stderr,
    /// Append to a file
    File {
        /// Path to the log file
        path: PathBuf,
    },
}

/// Configuration for tracing initialization
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Log level
    pub level: TracingLevel,
    /// Output destination
    pub output: TracingOutput,
    /// Custom filter string (overrides level if set)
    pub filter: Option<String>,
}

impl TracingConfig {
    /// Creates a new tracing configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the log level
    #[must_use]
    pub const fn with_level(mut self, level: TracingLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the output destination
    #[must_use]
    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    /// Sets a custom filter string
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Filter directive applied when no custom filter is set
    #[must_use]
    pub fn directive(&self) -> String {
        self.filter.clone().unwrap_or_else(|| {
            format!("vcimport_core={level},vcimport={level}", level = self.level)
        })
    }
}

/// Initializes the tracing subscriber with the given configuration
///
/// Call once at startup; later calls fail with `AlreadyInitialized`.
///
/// # Errors
///
/// Returns an error if tracing is already initialized, the filter is
/// invalid or the log file cannot be created.
pub fn init_tracing(config: &TracingConfig) -> TracingResult<()> {
    if TRACING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return Err(TracingError::AlreadyInitialized);
    }

    let filter = EnvFilter::try_new(config.directive())
        .map_err(|e| TracingError::InitializationFailed(e.to_string()))?;

    match &config.output {
        TracingOutput::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(true)
                        .with_level(true)
                        .with_writer(std::io::stderr),
                )
                .try_init()
                .map_err(|e| TracingError::InitializationFailed(e.to_string()))?;
        }
        TracingOutput::File { path } => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| TracingError::FileCreationFailed(format!("{}: {e}", path.display())))?;

            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(true)
                        .with_level(true)
                        .with_ansi(false)
                        .with_writer(file),
                )
                .try_init()
                .map_err(|e| TracingError::InitializationFailed(e.to_string()))?;
        }
    }

    tracing::debug!(level = %config.level, "Tracing initialized");
    Ok(())
}

/// Creates an info span with standard fields
///
/// ```ignore
/// let _span = trace_operation!(span_names::IMPORT_RUN, family = %family).entered();
/// ```
#[macro_export]
macro_rules! trace_operation {
    ($name:expr) => {
        tracing::info_span!($name)
    };
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}

/// Standard span names
pub mod span_names {
    /// Remote session login
    pub const CONNECTION_OPEN: &str = "connection.open";
    /// Remote session logout
    pub const CONNECTION_CLOSE: &str = "connection.close";
    /// One import operation
    pub const IMPORT_RUN: &str = "import.run";
    /// Storage cache population
    pub const INVENTORY_FETCH: &str = "inventory.fetch";
    /// Datastore monitoring pass
    pub const DATASTORE_MONITOR: &str = "datastore.monitor";
    /// Settings file read
    pub const CONFIG_LOAD: &str = "config.load";
    /// Settings file write
    pub const CONFIG_SAVE: &str = "config.save";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_level_from_str() {
        assert_eq!("error".parse::<TracingLevel>(), Ok(TracingLevel::Error));
        assert_eq!("WARN".parse::<TracingLevel>(), Ok(TracingLevel::Warn));
        assert_eq!("Info".parse::<TracingLevel>(), Ok(TracingLevel::Info));
        assert_eq!("trace".parse::<TracingLevel>(), Ok(TracingLevel::Trace));
        assert!("invalid".parse::<TracingLevel>().is_err());
    }

    #[test]
    fn verbosity_raises_the_level() {
        assert_eq!(TracingLevel::raised_by(TracingLevel::Warn, 0), TracingLevel::Warn);
        assert_eq!(TracingLevel::raised_by(TracingLevel::Warn, 1), TracingLevel::Info);
        assert_eq!(TracingLevel::raised_by(TracingLevel::Warn, 3), TracingLevel::Trace);
        assert_eq!(TracingLevel::raised_by(TracingLevel::Warn, 9), TracingLevel::Trace);
    }

    #[test]
    fn second_init_is_rejected() {
        let config = TracingConfig::new().with_level(TracingLevel::Error);
        let _ = init_tracing(&config);
        assert!(matches!(init_tracing(&config), Err(TracingError::AlreadyInitialized)));
    }

    #[test]
    fn directive_covers_both_crates() {
        let config = TracingConfig::new().with_level(TracingLevel::Debug);
        assert_eq!(config.directive(), "vcimport_core=debug,vcimport=debug");

        let custom = config.with_filter("vcimport_core=trace,reqwest=warn");
        assert_eq!(custom.directive(), "vcimport_core=trace,reqwest=warn");
    }

    #[test]
    fn default_output_is_stderr() {
        assert_eq!(TracingConfig::default().output, TracingOutput::Stderr);
        assert_eq!(TracingConfig::default().level, TracingLevel::Warn);
    }
}
