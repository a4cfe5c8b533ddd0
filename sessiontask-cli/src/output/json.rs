//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use sessiontask_core::{CachePhase, Lifecycle, Payload, TaskState};
use sessiontask_fetch::{RunOutcome, SessionTask};
use sessiontask_store::CacheEntry;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for one listener notification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOutput {
    pub event: &'static str,
    pub lifecycle: Lifecycle,
    pub cache: CachePhase,
    pub has_response: bool,
}

impl NotificationOutput {
    /// Captures a notification from the task's current state.
    pub fn capture(event: &'static str, task: &SessionTask) -> Self {
        let state = task.state();
        Self {
            event,
            lifecycle: state.lifecycle(),
            cache: state.cache(),
            has_response: task.response_object().is_some(),
        }
    }
}

/// JSON output for a finished request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOutput<'a> {
    pub request_type: &'a str,
    pub method: &'a str,
    pub url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<&'a str>,
    pub lifecycle: Lifecycle,
    pub cache: CachePhase,
    pub served_from_cache: bool,
    pub duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<&'a Payload>,
    pub notifications: &'a [NotificationOutput],
}

impl<'a> RequestOutput<'a> {
    /// Builds the output from a finished task.
    pub fn new(
        task: &'a SessionTask,
        outcome: &RunOutcome,
        notifications: &'a [NotificationOutput],
    ) -> Self {
        let state: TaskState = outcome.state;
        Self {
            request_type: task.request_type(),
            method: task.method().as_str(),
            url: task.absolute_url(),
            cache_key: task.cache_key().map(|k| k.as_str()),
            lifecycle: state.lifecycle(),
            cache: state.cache(),
            served_from_cache: outcome.served_from_cache,
            duration_ms: outcome.duration.as_millis(),
            code: task.code_key(),
            message: task.message(),
            error: task.error().map(ToString::to_string),
            response: task.response_object(),
            notifications,
        }
    }
}

/// JSON output for a stored cache entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntryOutput<'a> {
    pub url: &'a str,
    pub key: &'a str,
    #[serde(serialize_with = "serialize_datetime")]
    pub stored_at: DateTime<Utc>,
    pub payload: &'a Payload,
}

impl<'a> CacheEntryOutput<'a> {
    /// Builds the output for `entry`.
    pub fn new(url: &'a str, key: &'a str, entry: &'a CacheEntry) -> Self {
        Self {
            url,
            key,
            stored_at: entry.stored_at,
            payload: &entry.payload,
        }
    }
}

fn serialize_datetime<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&dt.to_rfc3339())
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }
}
