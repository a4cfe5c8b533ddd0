//! Text output formatting with colors.

use chrono::{DateTime, Local, Utc};
use sessiontask_core::{Lifecycle, Payload};
use sessiontask_fetch::{NetworkConfig, RunOutcome, SessionTask};
use sessiontask_store::CacheEntry;

use super::json::NotificationOutput;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Formats one listener notification: `→ sending  running + cache_fail`.
    pub fn format_notification(&self, notification: &NotificationOutput) -> String {
        let state = format!("{} + {}", notification.lifecycle, notification.cache);
        let mut line = format!(
            "{} {:<10} {}",
            self.dim("→"),
            notification.event,
            self.color_for_lifecycle(notification.lifecycle, &state)
        );
        if notification.has_response {
            line.push_str(&self.dim(" (payload available)"));
        }
        line
    }

    /// Formats the summary of a finished request.
    pub fn format_request(&self, task: &SessionTask, outcome: &RunOutcome) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "{} {}",
            self.bold(task.method().as_str()),
            task.absolute_url()
        ));

        let state = outcome.state;
        lines.push(format!(
            "  State:    {}",
            self.color_for_lifecycle(state.lifecycle(), &state.lifecycle().to_string())
        ));
        lines.push(format!("  Cache:    {}", state.cache()));
        lines.push(format!("  Duration: {}ms", outcome.duration.as_millis()));

        if let Some(key) = task.cache_key() {
            lines.push(format!("  Key:      {}", self.dim(key.as_str())));
        }
        if let Some(code) = task.code_key() {
            lines.push(format!("  Code:     {code}"));
        }
        if let Some(message) = task.message() {
            lines.push(format!("  Message:  {message}"));
        }
        if let Some(error) = task.error() {
            lines.push(format!("  Error:    {}", self.red(&error.to_string())));
        }
        if let Some(payload) = task.response_object() {
            let label = if outcome.served_from_cache && !state.is_succeeded() {
                "Response (cached)"
            } else {
                "Response"
            };
            lines.push(String::new());
            lines.push(self.bold(label));
            lines.push(format_payload(payload));
        }

        lines.join("\n")
    }

    /// Formats a stored cache entry.
    pub fn format_cache_entry(&self, url: &str, key: &str, entry: &CacheEntry) -> String {
        [
            self.bold(url),
            format!("  Key:    {}", self.dim(key)),
            format!("  Stored: {}", format_timestamp(entry.stored_at)),
            String::new(),
            format_payload(&entry.payload),
        ]
        .join("\n")
    }

    /// Formats the network config.
    pub fn format_config(&self, config: &NetworkConfig) -> String {
        let mut lines = vec![
            self.bold("SessionTask Configuration"),
            "─".repeat(40),
            format!("Base URL:        {}", config.base_url),
            format!("Success code:    {}", config.success_code),
            format!("Code field:      {}", config.code_field),
            format!("Message field:   {}", config.message_field),
            format!("Page params:     {} / {}", config.page_param, config.page_size_param),
            format!("Timeout:         {}s", config.timeout_secs),
        ];
        if config.default_headers.is_empty() {
            lines.push(format!("Default headers: {}", self.dim("none")));
        } else {
            lines.push("Default headers:".to_string());
            for (name, value) in &config.default_headers {
                lines.push(format!("  {name}: {value}"));
            }
        }
        lines.join("\n")
    }

    /// Formats an error message.
    pub fn format_error(&self, context: &str, error: &str) -> String {
        format!("{}: {} - {}", self.bold(context), self.red("Error"), error)
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn color_for_lifecycle(&self, lifecycle: Lifecycle, text: &str) -> String {
        match lifecycle {
            Lifecycle::Success => self.green(text),
            Lifecycle::Fail => self.red(text),
            Lifecycle::NoReach | Lifecycle::Cancelled => self.yellow(text),
            Lifecycle::Runnable | Lifecycle::Running => self.cyan(text),
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}

fn format_payload(payload: &Payload) -> String {
    serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
