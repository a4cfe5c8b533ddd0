//! Core error types for SessionTask.

use thiserror::Error;

/// Error type for parsing core values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Unknown HTTP method name.
    #[error("Invalid method: {0}")]
    InvalidMethod(String),
}

/// Why a task attempt did not produce a successful result.
///
/// These are stored on the task and surfaced to listeners; request failures
/// never propagate as `Err` out of the completion pipeline. Only
/// [`TaskError::AlreadyRunning`] and [`TaskError::Cancelled`] are returned to
/// callers of `start_session`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The server could not be reached.
    #[error("Cannot reach server: {0}")]
    Connectivity(String),

    /// The server answered but its status code signals failure.
    #[error("Business error: {message}")]
    Business {
        /// Code reported by the server, if any.
        code: Option<i64>,
        /// Message reported by the server.
        message: String,
    },

    /// The server answered with a non-success HTTP status.
    #[error("HTTP status {status}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
    },

    /// The response body could not be interpreted.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The request failed for a reason other than reachability.
    #[error("Request failed: {0}")]
    Request(String),

    /// The attempt was cancelled by the caller.
    #[error("Task cancelled")]
    Cancelled,

    /// `start_session` was called while an attempt was in flight.
    #[error("Task is already running")]
    AlreadyRunning,
}

impl TaskError {
    /// Returns true for reachability failures.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, TaskError::Connectivity(_))
    }

    /// Returns true for server-reported business failures.
    pub fn is_business(&self) -> bool {
        matches!(self, TaskError::Business { .. })
    }
}
