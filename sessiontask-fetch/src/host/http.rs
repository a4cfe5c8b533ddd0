//! HTTP transport backed by reqwest.
//!
//! Maps reqwest's results onto the three transport outcomes:
//! - connection failures and timeouts are `Unreachable`
//! - non-2xx statuses and unparseable bodies are `Failed`
//! - everything else is `Completed` with the parsed JSON body

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use sessiontask_core::{Method, Payload, TaskError};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::HttpError;
use crate::transport::{PreparedRequest, Transport, TransportOutcome};

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent string for SessionTask.
const USER_AGENT: &str = concat!("SessionTask/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// HTTP Transport
// ============================================================================

/// Transport performing real HTTP calls.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    inner: Client,
}

impl HttpTransport {
    /// Creates a transport with default settings.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a transport with a custom timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built. This should only occur
    /// if the system's TLS/SSL configuration is fundamentally broken,
    /// making network operations impossible.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                panic!(
                    "Failed to create HTTP client: {e}. \
                    This usually indicates a broken TLS/SSL configuration."
                )
            });

        Self { inner: client }
    }

    /// Returns the inner reqwest client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    async fn send(&self, request: &PreparedRequest) -> Result<Response, HttpError> {
        let url = Url::parse(request.request_url())
            .map_err(|e| HttpError::InvalidUrl(format!("{}: {e}", request.request_url())))?;
        let mut builder = self
            .inner
            .request(to_reqwest_method(request.method), url)
            .headers(build_headers(&request.headers)?);
        if let Some(form) = request.form_body() {
            let pairs: Vec<(&str, &str)> = form.iter().collect();
            builder = builder.form(&pairs);
        }

        Ok(builder.send().await?)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.request_url()))]
    async fn execute(&self, request: &PreparedRequest) -> TransportOutcome {
        let response = match self.send(request).await {
            Ok(response) => response,
            Err(e) if e.is_unreachable() => {
                debug!(error = %e, "Server unreachable");
                return TransportOutcome::Unreachable(e.to_string());
            }
            Err(e) => {
                warn!(error = %e, "Request failed");
                return TransportOutcome::Failed(TaskError::Request(e.to_string()));
            }
        };

        let status = response.status();
        debug!(status = %status, "Response received");
        if !status.is_success() {
            return TransportOutcome::Failed(TaskError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => {
                return TransportOutcome::Unreachable(e.to_string());
            }
            Err(e) => return TransportOutcome::Failed(TaskError::Request(e.to_string())),
        };
        match parse_body(&body) {
            Ok(payload) => TransportOutcome::Completed(payload),
            Err(e) => TransportOutcome::Failed(TaskError::InvalidResponse(e.to_string())),
        }
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
    }
}

/// Converts merged task headers into a reqwest header map.
fn build_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap, HttpError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| HttpError::InvalidHeader(format!("name `{name}`")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| HttpError::InvalidHeader(format!("value for `{name}`")))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// Parses a response body. An empty body is `null`.
fn parse_body(body: &[u8]) -> Result<Payload, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Payload::Null);
    }
    serde_json::from_slice(body)
}

// ============================================================================
// Tests
// ============================================================================
