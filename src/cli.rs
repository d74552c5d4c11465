//! Command-line interface definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::logging::LogFormat;
use crate::version;
use crate::worker::{Isolation, default_worker_capacity};

/// HTTP service that computes primes, each request in its own isolated unit.
#[derive(Parser, Debug)]
#[command(name = "primes-api")]
#[command(author, version = version::clap_version(), about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    pub quiet: bool,

    /// Log level (error, warn, info, debug, trace). Overrides -v/-q.
    #[arg(long, env = "PRIMES_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log output format.
    #[arg(long, value_enum, env = "PRIMES_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormatArg>,

    /// Also write logs to this file.
    #[arg(long, env = "PRIMES_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long, env = "NO_COLOR", global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server.
    Serve(ServeArgs),

    /// Compute primes up to N once, in an isolated unit, and print the JSON response.
    Compute(ComputeArgs),

    /// Run as a compute unit, reading one request from stdin.
    #[command(hide = true)]
    Worker,
}

/// Arguments for the serve command.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Host address to bind to.
    #[arg(long, env = "PRIMES_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, env = "PRIMES_PORT", default_value_t = 3000)]
    pub port: u16,

    /// How compute units are isolated.
    #[arg(long, value_enum, env = "PRIMES_ISOLATION", default_value_t = Isolation::Process)]
    pub isolation: Isolation,

    /// Advisory worker capacity reported at startup and in /api/health.
    #[arg(long, env = "PRIMES_WORKER_CAPACITY", default_value_t = default_worker_capacity())]
    pub worker_capacity: usize,

    /// Enable CORS for all origins.
    #[arg(long)]
    pub cors: bool,

    /// Allowed CORS origins (comma-separated). Implies --cors.
    #[arg(long, value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,
}

/// Arguments for the compute command.
#[derive(Parser, Debug)]
pub struct ComputeArgs {
    /// Inclusive upper bound, an integer greater than 1.
    #[arg(allow_hyphen_values = true)]
    pub limit: String,

    /// How the compute unit is isolated.
    #[arg(long, value_enum, env = "PRIMES_ISOLATION", default_value_t = Isolation::Process)]
    pub isolation: Isolation,

    /// Pretty-print the JSON response.
    #[arg(long)]
    pub pretty: bool,
}

/// Log format argument.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

/// Verbosity selected by -q / -v flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// -q: errors only.
    Quiet,
    /// Default: the command's preset level.
    Normal,
    /// -v: debug.
    Debug,
    /// -vv: trace.
    Trace,
}

impl Cli {
    /// Get the verbosity level based on -q and -v flags.
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            return Verbosity::Quiet;
        }
        match self.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Debug,
            _ => Verbosity::Trace,
        }
    }
}
