//! Logging setup for primes-api.
//!
//! The server, the one-shot `compute` command and worker processes all log
//! through `tracing`. Everything goes to stderr: a worker's stdout carries the
//! result protocol and must stay clean.
//!
//! # Environment Variables
//!
//! - `PRIMES_LOG` - Log filter (overrides RUST_LOG)
//! - `PRIMES_LOG_LEVEL` - Log level: error, warn, info, debug, trace
//! - `PRIMES_LOG_FORMAT` - Output format: pretty, compact, json
//! - `PRIMES_LOG_FILE` - Path to log file (in addition to stderr)
//! - `PRIMES_LOG_ROTATION` - File rotation: hourly, daily, never
//! - `RUST_LOG` - Standard Rust log filter (fallback)
//!
//! # Example
//!
//! ```no_run
//! use primes_api::logging::{LogConfig, init};
//!
//! init(LogConfig::for_server().with_env_overrides());
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-field format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON lines for log aggregation
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "full" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "Unknown log format: '{}'. Valid options: pretty, compact, json",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Compact => write!(f, "compact"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Rotation policy for the log file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    /// Single file, never rotated
    Never,
}

impl FromStr for LogRotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "never" => Ok(Self::Never),
            _ => Err(format!(
                "Unknown log rotation: '{}'. Valid options: hourly, daily, never",
                s
            )),
        }
    }
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

/// Logging configuration.
///
/// Start from a preset, adjust with the builder methods, then pass to [`init`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level (default: INFO)
    pub level: Level,
    /// Output format (default: Pretty)
    pub format: LogFormat,
    /// Optional log file, written in addition to stderr
    pub file_path: Option<PathBuf>,
    /// Rotation for the log file (default: Daily)
    pub rotation: LogRotation,
    /// Log span timing on close
    pub span_events: bool,
    /// Custom filter directive (overrides `level` if set)
    pub filter: Option<String>,
    /// Show the target module
    pub show_target: bool,
    /// Show thread IDs
    pub show_thread_ids: bool,
    /// Colorize stderr output
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            file_path: None,
            rotation: LogRotation::Daily,
            span_events: false,
            filter: None,
            show_target: true,
            show_thread_ids: false,
            ansi: true,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset for `serve`: INFO, pretty, with thread IDs so concurrent
    /// requests can be told apart.
    pub fn for_server() -> Self {
        Self {
            show_thread_ids: true,
            ..Self::default()
        }
    }

    /// Preset for the one-shot `compute` command: warnings only.
    pub fn for_cli() -> Self {
        Self {
            level: Level::WARN,
            format: LogFormat::Compact,
            show_target: false,
            ..Self::default()
        }
    }

    /// Preset for worker processes.
    ///
    /// Workers share the server's stderr, so they stay quiet and compact and
    /// never open the log file themselves.
    pub fn for_worker() -> Self {
        Self {
            level: Level::WARN,
            format: LogFormat::Compact,
            show_target: false,
            ansi: false,
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_file(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self
    }

    pub fn with_rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: String) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    /// Apply environment variable overrides.
    ///
    /// Values already set from the command line win: `PRIMES_LOG`, `RUST_LOG`
    /// and `PRIMES_LOG_LEVEL` are only consulted when no filter is set.
    pub fn with_env_overrides(mut self) -> Self {
        if self.filter.is_none() {
            if let Ok(filter) = std::env::var("PRIMES_LOG") {
                self.filter = Some(filter);
            } else if let Ok(filter) = std::env::var("RUST_LOG") {
                self.filter = Some(filter);
            }
        }

        if self.filter.is_none()
            && let Ok(level_str) = std::env::var("PRIMES_LOG_LEVEL")
        {
            self.level = parse_level(&level_str).unwrap_or(self.level);
        }

        if let Ok(format) = std::env::var("PRIMES_LOG_FORMAT")
            && let Ok(f) = format.parse()
        {
            self.format = f;
        }

        if self.file_path.is_none()
            && let Ok(path) = std::env::var("PRIMES_LOG_FILE")
        {
            self.file_path = Some(PathBuf::from(path));
        }

        if let Ok(rotation) = std::env::var("PRIMES_LOG_ROTATION")
            && let Ok(r) = rotation.parse()
        {
            self.rotation = r;
        }

        self
    }

    fn build_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.level.as_str().to_lowercase());
        match self.filter {
            Some(ref filter) => EnvFilter::try_new(filter).unwrap_or_else(|_| {
                eprintln!("Warning: Invalid log filter '{}', using default", filter);
                fallback()
            }),
            None => fallback(),
        }
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn file_appender(&self) -> Option<RollingFileAppender> {
        let path = self.file_path.as_ref()?;
        let parent = path.parent().unwrap_or(Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("primes-api.log");
        Some(RollingFileAppender::new(
            self.rotation.into(),
            parent,
            file_name,
        ))
    }
}

/// Parse a log level string.
pub fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

/// Initialize the global tracing subscriber.
///
/// Logs to stderr, and also to `config.file_path` when set. Call once at
/// startup; later calls are ignored.
///
/// # Example
///
/// ```no_run
/// use std::path::PathBuf;
/// use primes_api::logging::{LogConfig, init};
///
/// init(LogConfig::for_server().with_file(PathBuf::from("/var/log/primes-api.log")));
/// ```
pub fn init(config: LogConfig) {
    let filter = config.build_filter();
    let appender = config.file_appender();

    // Option<Layer> is itself a layer, so a missing file simply adds nothing.
    let result = match config.format {
        LogFormat::Json => {
            let stderr_layer = fmt::layer()
                .json()
                .with_span_events(config.span_events())
                .with_target(config.show_target)
                .with_writer(std::io::stderr);
            let file_layer = appender.map(|writer| {
                fmt::layer()
                    .json()
                    .with_span_events(config.span_events())
                    .with_target(config.show_target)
                    .with_ansi(false)
                    .with_writer(writer)
            });

            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .try_init()
        }
        LogFormat::Compact => {
            let stderr_layer = fmt::layer()
                .compact()
                .with_span_events(config.span_events())
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .with_ansi(config.ansi)
                .with_writer(std::io::stderr);
            let file_layer = appender.map(|writer| {
                fmt::layer()
                    .compact()
                    .with_span_events(config.span_events())
                    .with_target(config.show_target)
                    .with_thread_ids(config.show_thread_ids)
                    .with_ansi(false)
                    .with_writer(writer)
            });

            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .try_init()
        }
        LogFormat::Pretty => {
            let stderr_layer = fmt::layer()
                .with_span_events(config.span_events())
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .with_ansi(config.ansi)
                .with_writer(std::io::stderr);
            let file_layer = appender.map(|writer| {
                fmt::layer()
                    .with_span_events(config.span_events())
                    .with_target(config.show_target)
                    .with_thread_ids(config.show_thread_ids)
                    .with_ansi(false)
                    .with_writer(writer)
            });

            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .try_init()
        }
    };

    let _ = result;
}
