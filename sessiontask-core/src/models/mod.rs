//! Domain models for SessionTask.
//!
//! ## Submodules
//!
//! - [`state`] - Task state (Lifecycle, CachePhase, TaskState)
//! - [`request`] - Request identity (Method, Params, CacheKey)

mod request;
mod state;

pub use request::{CacheKey, Method, Params};
pub use state::{CachePhase, Lifecycle, TaskState};
