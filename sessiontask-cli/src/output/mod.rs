//! Output formatting for CLI.

mod json;
mod text;

pub use json::{CacheEntryOutput, JsonFormatter, NotificationOutput, RequestOutput};
pub use text::TextFormatter;
