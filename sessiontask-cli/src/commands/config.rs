//! Config command - inspect configuration.

use anyhow::Result;
use clap::{Args, Subcommand};
use sessiontask_store::{default_config_path, FileCacheStore};

use crate::commands::{load_network_config, open_cache};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective network configuration.
    Show,

    /// Show configuration and cache paths.
    Path,
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli) -> Result<ExitCode> {
    match &args.action {
        ConfigAction::Show => show_config(cli).await,
        ConfigAction::Path => show_paths(cli),
    }
}

async fn show_config(cli: &Cli) -> Result<ExitCode> {
    let config = load_network_config(cli).await?;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_config(&config));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&config)?);
        }
    }

    Ok(ExitCode::Success)
}

fn show_paths(cli: &Cli) -> Result<ExitCode> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let cache = open_cache(cli);

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config file: {}", config_path.display());
            println!("Cache dir:   {}", cache.dir().display());
            if cli.cache_dir.is_some() {
                println!("Default:     {}", FileCacheStore::open_default().dir().display());
            }
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_file": config_path.display().to_string(),
                "cache_dir": cache.dir().display().to_string(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(ExitCode::Success)
}
