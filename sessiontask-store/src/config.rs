//! Network configuration loading.

use sessiontask_fetch::NetworkConfig;
use std::path::Path;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::persistence::{default_config_path, load_json_if_exists, save_json};

/// Loads the network config from the default path.
pub async fn load_config() -> Result<NetworkConfig, StoreError> {
    load_config_from(&default_config_path()).await
}

/// Loads the network config from `path`, using defaults if it is missing.
pub async fn load_config_from(path: &Path) -> Result<NetworkConfig, StoreError> {
    let Some(config) = load_json_if_exists::<NetworkConfig>(path).await? else {
        debug!(path = %path.display(), "Config file not found, using defaults");
        return Ok(NetworkConfig::default());
    };

    validate(&config)?;
    info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

/// Saves the network config to `path`.
pub async fn save_config_to(config: &NetworkConfig, path: &Path) -> Result<(), StoreError> {
    validate(config)?;
    save_json(path, config).await?;
    info!(path = %path.display(), "Saved configuration");
    Ok(())
}

/// Checks values serde cannot.
pub fn validate(config: &NetworkConfig) -> Result<(), StoreError> {
    if !(config.base_url.starts_with("http://") || config.base_url.starts_with("https://")) {
        return Err(StoreError::Config(format!(
            "base_url must be an http(s) URL, got `{}`",
            config.base_url
        )));
    }
    if config.timeout_secs == 0 {
        return Err(StoreError::Config("timeout_secs must be positive".to_string()));
    }
    if config.code_field.is_empty() {
        return Err(StoreError::Config("code_field must not be empty".to_string()));
    }
    Ok(())
}
