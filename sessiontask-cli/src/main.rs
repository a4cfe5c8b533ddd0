// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! SessionTask CLI - run cached API requests from the command line.
//!
//! # Examples
//!
//! ```bash
//! # GET http://api.test/items?q=x
//! sessiontask request /items --base-url http://api.test --param q=x
//!
//! # Path substitution: /items/42
//! sessiontask request /items/:id --sub 42
//!
//! # JSON output
//! sessiontask --format json --pretty request /items
//!
//! # Cache key for a URL
//! sessiontask cache key "http://api.test/items?q=x"
//! ```

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use sessiontask_core::Lifecycle;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{cache, config, request};

// ============================================================================
// CLI Definition
// ============================================================================

/// SessionTask CLI - cached API requests.
#[derive(Parser)]
#[command(name = "sessiontask")]
#[command(about = "Run cached API requests")]
#[command(long_about = r#"
SessionTask runs API requests with a local response cache.

Each request imports any cached response for its URL first, then calls the
server. A successful response is written back to the cache; an unreachable
server leaves the cached response available.

Examples:
  sessiontask request /items --param q=x     # GET with a query
  sessiontask request /items/:id --sub 42    # Path substitution
  sessiontask --format json request /items   # JSON output
  sessiontask cache clear                    # Drop cached responses
"#)]
#[command(version)]
#[command(author = "SessionTask Contributors")]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Config file, instead of the default location.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Cache directory, instead of the default location.
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run one request.
    #[command(visible_alias = "r")]
    Request(request::RequestArgs),

    /// Inspect or prune the response cache.
    Cache(cache::CacheArgs),

    /// Inspect configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// The server answered with a failure.
    Failed = 2,
    /// The server could not be reached.
    NoReach = 3,
    /// The request was cancelled.
    Cancelled = 4,
}

impl ExitCode {
    /// Maps a task's final lifecycle to an exit code.
    pub fn from_lifecycle(lifecycle: Lifecycle) -> Self {
        match lifecycle {
            Lifecycle::Success => Self::Success,
            Lifecycle::Fail => Self::Failed,
            Lifecycle::NoReach => Self::NoReach,
            Lifecycle::Cancelled => Self::Cancelled,
            Lifecycle::Runnable | Lifecycle::Running => Self::Error,
        }
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return; // No logging in quiet mode
    }

    let filter = if verbose {
        EnvFilter::new("sessiontask=debug,info")
    } else {
        EnvFilter::new("sessiontask=warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Request(args) => request::run(args, &cli).await,
        Commands::Cache(args) => cache::run(args, &cli).await,
        Commands::Config(args) => config::run(args, &cli).await,
    };

    match result {
        Ok(ExitCode::Success) => Ok(()),
        Ok(code) => std::process::exit(code as i32),
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(ExitCode::Error as i32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::from_lifecycle(Lifecycle::Success) as i32, 0);
        assert_eq!(ExitCode::from_lifecycle(Lifecycle::Fail) as i32, 2);
        assert_eq!(ExitCode::from_lifecycle(Lifecycle::NoReach) as i32, 3);
        assert_eq!(ExitCode::from_lifecycle(Lifecycle::Cancelled) as i32, 4);
    }

    #[test]
    fn test_parse_request_command() {
        let cli = Cli::try_parse_from([
            "sessiontask",
            "--format",
            "json",
            "request",
            "/items/:id",
            "--sub",
            "42",
            "--param",
            "q=x",
            "--no-cache",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        let Commands::Request(args) = cli.command else {
            panic!("expected request command");
        };
        assert_eq!(args.path, "/items/:id");
        assert_eq!(args.subs, vec!["42".to_string()]);
        assert_eq!(args.params, vec!["q=x".to_string()]);
        assert!(args.no_cache);
        assert_eq!(args.method, "GET");
    }
}
