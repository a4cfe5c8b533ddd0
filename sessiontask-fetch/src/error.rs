//! Fetch error types.

use thiserror::Error;

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid header name or value.
    #[error("Invalid header {0}")]
    InvalidHeader(String),
}

impl HttpError {
    /// Returns true if the error means the server was never reached.
    ///
    /// Connection failures and timeouts count as unreachable; anything else
    /// is a failed request.
    pub fn is_unreachable(&self) -> bool {
        match self {
            HttpError::Request(e) => e.is_connect() || e.is_timeout(),
            HttpError::InvalidUrl(_) | HttpError::InvalidHeader(_) => false,
        }
    }
}

// ============================================================================
// Cache Error
// ============================================================================

/// Error type for cache store operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored entry could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure.
    #[error("Cache error: {0}")]
    Other(String),
}
