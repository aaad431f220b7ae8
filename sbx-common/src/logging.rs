//! Logging setup shared by the sandbox bridge binaries.
//!
//! Logs always go to stderr or a file, never stdout: in hook mode stdout
//! carries the protocol response.

use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::EnvParser;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter {filter:?}: {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("log file path has no file name: {0}")]
    InvalidFile(PathBuf),

    #[error("failed to install subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Where and how to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub stderr: bool,
    pub file: Option<PathBuf>,
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::Compact,
            stderr: false,
            file: None,
        }
    }

    /// Build from `SBX_LOG_LEVEL`, `SBX_LOG_JSON` and `SBX_LOG_FILE`.
    pub fn from_env(default_level: &str) -> Self {
        let mut parser = EnvParser::new();
        let level = parser.get_string("LOG_LEVEL", default_level);
        let json = parser.get_bool("LOG_JSON", false);
        let file = parser.get_optional_path("LOG_FILE");
        for error in parser.take_errors() {
            eprintln!("sbx: {error}");
        }

        Self {
            level,
            format: if json { LogFormat::Json } else { LogFormat::Compact },
            stderr: false,
            file,
        }
    }

    pub fn with_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }
}

/// Keeps background log writers alive; drop it at process exit.
#[must_use]
pub struct LoggingGuards {
    _file: Option<WorkerGuard>,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global tracing subscriber described by `config`.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuards, LoggingError> {
    let filter = EnvFilter::try_new(&config.level).map_err(|e| LoggingError::InvalidFilter {
        filter: config.level.clone(),
        message: e.to_string(),
    })?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if config.stderr {
        let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
        layers.push(match config.format {
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Compact => layer.compact().boxed(),
        });
    }

    let mut file_guard = None;
    if let Some(path) = &config.file {
        let file_name = path
            .file_name()
            .ok_or_else(|| LoggingError::InvalidFile(path.clone()))?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt::layer().json().with_writer(writer).with_ansi(false).boxed());
        file_guard = Some(guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;

    Ok(LoggingGuards { _file: file_guard })
}
