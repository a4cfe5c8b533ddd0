//! Task context providing configuration and collaborators.
//!
//! The context is handed to every task operation that needs something
//! outside the task itself: process-wide defaults, the transport, the cache
//! store and the key digest.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStore, MemoryCacheStore};
use crate::digest::{KeyDigest, Sha256Digest};
use crate::host::http::HttpTransport;
use crate::transport::Transport;

// ============================================================================
// Network Config
// ============================================================================

/// Process-wide request defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Base URL used by tasks that do not set their own.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Headers sent with every request unless a task overrides them.
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
    /// Business code that marks a successful response.
    #[serde(default)]
    pub success_code: i64,
    /// Payload field holding the business code.
    #[serde(default = "default_code_field")]
    pub code_field: String,
    /// Payload field holding the server message.
    #[serde(default = "default_message_field")]
    pub message_field: String,
    /// Query parameter name for the page number.
    #[serde(default = "default_page_param")]
    pub page_param: String,
    /// Query parameter name for the page size.
    #[serde(default = "default_page_size_param")]
    pub page_size_param: String,
    /// Transport timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost".to_string()
}

fn default_code_field() -> String {
    "code".to_string()
}

fn default_message_field() -> String {
    "message".to_string()
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_page_size_param() -> String {
    "pageSize".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            default_headers: BTreeMap::new(),
            success_code: 0,
            code_field: default_code_field(),
            message_field: default_message_field(),
            page_param: default_page_param(),
            page_size_param: default_page_size_param(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl NetworkConfig {
    /// Creates a config with the given base URL and defaults elsewhere.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Returns the transport timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Merges per-task header overrides over the default headers.
    ///
    /// Header names compare case-insensitively; the override's spelling wins.
    pub fn merge_headers(&self, overrides: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut merged = self.default_headers.clone();
        for (name, value) in overrides {
            merged.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
            merged.insert(name.clone(), value.clone());
        }
        merged
    }
}

// ============================================================================
// Task Context
// ============================================================================

/// Collaborators shared by the tasks of one client.
///
/// - Network config for defaults
/// - Transport that performs the call
/// - Cache store for import and write-back
/// - Digest deriving cache keys
#[derive(Clone)]
pub struct TaskContext {
    /// Process-wide defaults.
    pub config: NetworkConfig,
    /// Transport for outbound calls.
    pub transport: Arc<dyn Transport>,
    /// Cache store.
    pub cache: Arc<dyn CacheStore>,
    /// Cache key digest.
    pub digest: Arc<dyn KeyDigest>,
}

impl TaskContext {
    /// Creates a context with default collaborators.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a context with the given config and default collaborators.
    pub fn with_config(config: NetworkConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Creates a builder for customizing the context.
    pub fn builder() -> TaskContextBuilder {
        TaskContextBuilder::new()
    }
}

impl Default for TaskContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Task Context Builder
// ============================================================================

/// Builder for constructing a `TaskContext`.
pub struct TaskContextBuilder {
    config: NetworkConfig,
    transport: Option<Arc<dyn Transport>>,
    cache: Option<Arc<dyn CacheStore>>,
    digest: Option<Arc<dyn KeyDigest>>,
}

impl TaskContextBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            config: NetworkConfig::default(),
            transport: None,
            cache: None,
            digest: None,
        }
    }

    /// Sets the network config.
    pub fn config(mut self, config: NetworkConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the default base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Sets the business success code.
    pub fn success_code(mut self, code: i64) -> Self {
        self.config.success_code = code;
        self
    }

    /// Adds a default header.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(name.into(), value.into());
        self
    }

    /// Sets the transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the cache store.
    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets the key digest.
    pub fn digest(mut self, digest: Arc<dyn KeyDigest>) -> Self {
        self.digest = Some(digest);
        self
    }

    /// Builds the context.
    pub fn build(self) -> TaskContext {
        let timeout = self.config.timeout();
        TaskContext {
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(HttpTransport::with_timeout(timeout))),
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(MemoryCacheStore::new())),
            digest: self.digest.unwrap_or_else(|| Arc::new(Sha256Digest)),
            config: self.config,
        }
    }
}

impl Default for TaskContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = NetworkConfig::default();
        assert_eq!(config.success_code, 0);
        assert_eq!(config.code_field, "code");
        assert_eq!(config.page_size_param, "pageSize");
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_config_partial_json_uses_defaults() {
        let config: NetworkConfig =
            serde_json::from_str(r#"{"base_url": "https://api.test", "success_code": 200}"#)
                .unwrap();
        assert_eq!(config.base_url, "https://api.test");
        assert_eq!(config.success_code, 200);
        assert_eq!(config.message_field, "message");
    }

    #[test]
    fn test_merge_headers_override_wins_case_insensitively() {
        let mut config = NetworkConfig::default();
        config
            .default_headers
            .insert("Accept".to_string(), "text/html".to_string());
        config
            .default_headers
            .insert("X-App".to_string(), "demo".to_string());

        let mut overrides = BTreeMap::new();
        overrides.insert("accept".to_string(), "application/json".to_string());

        let merged = config.merge_headers(&overrides);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get("accept").map(String::as_str), Some("application/json"));
        assert!(!merged.contains_key("Accept"));
        assert_eq!(merged.get("X-App").map(String::as_str), Some("demo"));
    }

    #[test]
    fn test_context_builder() {
        let ctx = TaskContext::builder()
            .base_url("http://api.test")
            .success_code(1)
            .default_header("X-Token", "abc")
            .build();

        assert_eq!(ctx.config.base_url, "http://api.test");
        assert_eq!(ctx.config.success_code, 1);
        assert_eq!(ctx.config.default_headers.len(), 1);
    }
}
