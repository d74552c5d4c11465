//! primes-api - primes up to N, one isolated compute unit per request

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use owo_colors::{OwoColorize, Stream::Stderr};
use tracing::Level;

use primes_api::cli::{self, Cli, Commands, Verbosity};
use primes_api::dispatcher::{DispatchError, Dispatcher, DispatcherConfig};
use primes_api::logging::{self, LogConfig};
use primes_api::server::error::INVALID_LIMIT_MESSAGE;
use primes_api::server::handlers::parse_limit;
use primes_api::server::types::PrimesResponse;
use primes_api::worker;

/// Program entry point: parses CLI arguments, sets up logging, dispatches the
/// selected command and reports top-level errors.
///
/// On error prints a colored header followed by each cause in the chain and
/// exits with status 1.
fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        owo_colors::set_override(false);
    }

    // A worker answers one request on stdin/stdout and exits; it never
    // returns here.
    if let Commands::Worker = cli.command {
        let mut config = log_config(&cli, LogConfig::for_worker());
        config.file_path = None;
        logging::init(config);
        worker::run_worker_main();
    }

    let result = match &cli.command {
        Commands::Serve(args) => cmd_serve(&cli, args),
        Commands::Compute(args) => cmd_compute(&cli, args),
        Commands::Worker => Ok(()),
    };

    if let Err(e) = result {
        eprintln!(
            "{}: {}",
            "error"
                .if_supports_color(Stderr, |text| text.red())
                .if_supports_color(Stderr, |text| text.bold()),
            e
        );
        for cause in e.chain().skip(1) {
            eprintln!(
                "  {}: {}",
                "caused by".if_supports_color(Stderr, |text| text.yellow()),
                cause
            );
        }
        std::process::exit(1);
    }
}

/// Layer the global logging flags over `preset`.
///
/// Flags given on the command line become an explicit filter so that
/// `PRIMES_LOG` / `RUST_LOG` cannot override them.
fn log_config(cli: &Cli, preset: LogConfig) -> LogConfig {
    let mut config = preset;

    match cli.verbosity() {
        Verbosity::Quiet => config = config.with_filter("error".to_string()),
        Verbosity::Normal => {}
        Verbosity::Debug => config = config.with_filter("debug".to_string()),
        Verbosity::Trace => config = config.with_filter("trace".to_string()),
    }

    if let Some(ref level) = cli.log_level {
        match logging::parse_level(level) {
            Some(level) => config = config.with_level(level).with_filter(level_filter(level)),
            None => eprintln!("Warning: Unknown log level '{}', ignoring", level),
        }
    }

    if let Some(format) = cli.log_format {
        config = config.with_format(format.into());
    }
    if let Some(ref path) = cli.log_file {
        config = config.with_file(path.clone());
    }
    if cli.no_color {
        config = config.with_ansi(false);
    }

    config.with_env_overrides()
}

fn level_filter(level: Level) -> String {
    level.as_str().to_lowercase()
}

/// Starts the HTTP server.
///
/// Builds a ServerConfig from the serve arguments, creates a Tokio runtime,
/// and runs the server until Ctrl+C.
fn cmd_serve(cli: &Cli, args: &cli::ServeArgs) -> Result<()> {
    use primes_api::server::{ServerConfig, run_server};

    logging::init(log_config(cli, LogConfig::for_server()));

    let config = ServerConfig {
        host: args.host.clone(),
        port: args.port,
        isolation: args.isolation,
        worker_capacity: args.worker_capacity.max(1),
        cors: args.cors || args.cors_origins.is_some(),
        cors_origins: args.cors_origins.clone(),
    };

    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    rt.block_on(run_server(config)).context("HTTP server failed")?;

    Ok(())
}

/// Computes primes up to N once, through the same dispatcher the server
/// uses, and prints the response body the API would return.
fn cmd_compute(cli: &Cli, args: &cli::ComputeArgs) -> Result<()> {
    logging::init(log_config(cli, LogConfig::for_cli()));

    let Some(limit) = parse_limit(&args.limit) else {
        bail!(INVALID_LIMIT_MESSAGE);
    };

    let spawner = args
        .isolation
        .spawner()
        .context("Failed to set up compute unit backend")?;
    let dispatcher = Dispatcher::new(spawner, DispatcherConfig::default());

    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let response = rt.block_on(async {
        let submission = dispatcher.submit(limit).map_err(|e| match e {
            DispatchError::InvalidInput { .. } => anyhow!(INVALID_LIMIT_MESSAGE),
            other => other.into(),
        })?;
        let limit = submission.limit();
        let result = submission.await?;
        Ok::<_, anyhow::Error>(PrimesResponse::from_result(limit, result))
    })?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{}", json);

    Ok(())
}
