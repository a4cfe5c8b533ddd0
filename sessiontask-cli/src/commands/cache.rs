//! Cache command - inspect and prune the response cache.

use anyhow::Result;
use clap::{Args, Subcommand};
use sessiontask_fetch::{cache_key_for, CacheStore};
use tracing::info;

use crate::commands::open_cache;
use crate::output::{CacheEntryOutput, JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the cache command.
#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands.
#[derive(Subcommand)]
pub enum CacheAction {
    /// Print the cache key for an absolute URL.
    Key {
        /// Absolute URL, e.g. `http://api.test/items?q=x`.
        url: String,
    },

    /// Show the cached response for an absolute URL.
    Show {
        /// Absolute URL.
        url: String,
    },

    /// Remove the cached response for an absolute URL.
    Remove {
        /// Absolute URL.
        url: String,
    },

    /// Remove every cached response.
    Clear,
}

/// Runs the cache command.
pub async fn run(args: &CacheArgs, cli: &Cli) -> Result<ExitCode> {
    match &args.action {
        CacheAction::Key { url } => show_key(url, cli),
        CacheAction::Show { url } => show_entry(url, cli).await,
        CacheAction::Remove { url } => remove_entry(url, cli).await,
        CacheAction::Clear => clear(cli).await,
    }
}

fn show_key(url: &str, cli: &Cli) -> Result<ExitCode> {
    let key = cache_key_for(url);
    match cli.format {
        OutputFormat::Text => println!("{key}"),
        OutputFormat::Json => {
            let output = serde_json::json!({ "url": url, "key": key.as_str() });
            println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
        }
    }
    Ok(ExitCode::Success)
}

async fn show_entry(url: &str, cli: &Cli) -> Result<ExitCode> {
    let key = cache_key_for(url);
    let Some(entry) = open_cache(cli).entry(&key).await? else {
        if !cli.quiet {
            eprintln!("No cached response for {url}");
        }
        return Ok(ExitCode::Failed);
    };

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_cache_entry(url, key.as_str(), &entry));
        }
        OutputFormat::Json => {
            let output = CacheEntryOutput::new(url, key.as_str(), &entry);
            println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
        }
    }
    Ok(ExitCode::Success)
}

async fn remove_entry(url: &str, cli: &Cli) -> Result<ExitCode> {
    let key = cache_key_for(url);
    let removed = open_cache(cli).remove(&key).await?;
    info!(key = %key, removed, "Cache entry removal");

    match cli.format {
        OutputFormat::Text => {
            if removed {
                println!("Removed cached response for {url}");
            } else {
                println!("No cached response for {url}");
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({ "url": url, "key": key.as_str(), "removed": removed });
            println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
        }
    }
    Ok(ExitCode::Success)
}

async fn clear(cli: &Cli) -> Result<ExitCode> {
    let cache = open_cache(cli);
    let removed = cache.clear().await?;

    match cli.format {
        OutputFormat::Text => println!(
            "Removed {removed} cached response(s) from {}",
            cache.dir().display()
        ),
        OutputFormat::Json => {
            let output = serde_json::json!({
                "dir": cache.dir().display().to_string(),
                "removed": removed,
            });
            println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
        }
    }
    Ok(ExitCode::Success)
}
