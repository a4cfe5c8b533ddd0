//! CLI command implementations.

pub mod cache;
pub mod config;
pub mod request;

use anyhow::{Context, Result};
use sessiontask_fetch::NetworkConfig;
use sessiontask_store::{load_config, load_config_from, FileCacheStore};

use crate::Cli;

/// Loads the network config from `--config` or the default path.
pub async fn load_network_config(cli: &Cli) -> Result<NetworkConfig> {
    match &cli.config {
        Some(path) => load_config_from(path)
            .await
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(load_config().await?),
    }
}

/// Opens the file cache in `--cache-dir` or the default directory.
pub fn open_cache(cli: &Cli) -> FileCacheStore {
    cli.cache_dir
        .clone()
        .map_or_else(FileCacheStore::open_default, FileCacheStore::new)
}
