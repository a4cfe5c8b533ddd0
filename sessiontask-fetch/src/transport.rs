//! Transport abstraction.
//!
//! A transport performs the outbound call for a prepared task request and
//! reports one of three outcomes: a parsed payload, a failed request, or an
//! unreachable server.

use async_trait::async_trait;
use sessiontask_core::{Method, Params, Payload, TaskError};
use std::collections::BTreeMap;

// ============================================================================
// Prepared Request
// ============================================================================

/// Everything a transport needs to perform one task attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    /// HTTP method.
    pub method: Method,
    /// Base URL plus path, without query.
    pub endpoint_url: String,
    /// Endpoint plus query; the task's identity.
    pub absolute_url: String,
    /// Merged request headers.
    pub headers: BTreeMap<String, String>,
    /// Params, with pagination folded in.
    pub params: Params,
}

impl PreparedRequest {
    /// Returns the URL the transport should call.
    ///
    /// Body-carrying methods call the endpoint and send params as a form;
    /// all others call the absolute URL.
    pub fn request_url(&self) -> &str {
        if self.method.has_body() {
            &self.endpoint_url
        } else {
            &self.absolute_url
        }
    }

    /// Returns the form body, if the method carries one.
    pub fn form_body(&self) -> Option<&Params> {
        (self.method.has_body() && !self.params.is_empty()).then_some(&self.params)
    }
}

// ============================================================================
// Transport Outcome
// ============================================================================

/// Result of one transport call.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportOutcome {
    /// The server answered with a parsed payload.
    Completed(Payload),
    /// The server answered, or the call broke, in a way that is a failure.
    Failed(TaskError),
    /// The server could not be reached.
    Unreachable(String),
}

impl TransportOutcome {
    /// Returns a short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
            Self::Unreachable(_) => "unreachable",
        }
    }
}

// ============================================================================
// Transport Trait
// ============================================================================

/// Performs outbound calls for tasks.
///
/// ```ignore
/// struct CannedTransport(Payload);
///
/// #[async_trait]
/// impl Transport for CannedTransport {
///     async fn execute(&self, _request: &PreparedRequest) -> TransportOutcome {
///         TransportOutcome::Completed(self.0.clone())
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs the call described by `request`.
    async fn execute(&self, request: &PreparedRequest) -> TransportOutcome;
}
