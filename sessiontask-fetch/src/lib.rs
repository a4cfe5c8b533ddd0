// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # SessionTask Fetch
//!
//! Request tasks, cache policy and HTTP transport.
//!
//! ## The Task
//!
//! [`SessionTask`] owns one request's identity, policy flags, output and
//! state. Its listener is notified at three points:
//!
//! - `on_sending` once the attempt started (or was cancelled)
//! - `on_connected` once the server answered
//! - `on_lost` once the server turned out unreachable
//!
//! ## Collaborators
//!
//! A [`TaskContext`] bundles what a task needs from outside:
//!
//! - [`NetworkConfig`] - base URL, default headers, success code
//! - [`Transport`] - performs the call ([`HttpTransport`] by default)
//! - [`CacheStore`] - cache import and write-back ([`MemoryCacheStore`] by default)
//! - [`KeyDigest`] - cache key derivation ([`Sha256Digest`] by default)
//!
//! ## Example
//!
//! ```ignore
//! use sessiontask_fetch::{SessionTask, TaskContext, TaskRunner};
//!
//! let runner = TaskRunner::new(TaskContext::builder().base_url("https://api.example.com").build());
//! let mut task = SessionTask::new(Method::Get, "/items", Params::new(), &listener, "items");
//!
//! let outcome = runner.run(&mut task).await?;
//! ```

pub mod cache;
pub mod context;
pub mod digest;
pub mod error;
pub mod host;
pub mod listener;
pub mod runner;
pub mod task;
pub mod transport;
pub mod url;

// Errors
pub use error::{CacheError, HttpError};

// Task
pub use listener::TaskListener;
pub use task::{CancelHandle, SessionTask};

// Collaborators
pub use cache::{CacheStore, MemoryCacheStore};
pub use context::{NetworkConfig, TaskContext, TaskContextBuilder};
pub use digest::{cache_key_for, KeyDigest, Sha256Digest};
pub use host::HttpTransport;
pub use transport::{PreparedRequest, Transport, TransportOutcome};
pub use url::{BuiltUrl, UrlBuilder};

// Runner
pub use runner::{RunOutcome, TaskRunner};
