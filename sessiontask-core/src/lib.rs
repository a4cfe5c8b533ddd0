// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `SessionTask` Core
//!
//! Core types for the `SessionTask` request abstraction.
//!
//! This crate holds the pieces of a request task that involve no I/O:
//!
//! - The two-axis task state ([`Lifecycle`], [`CachePhase`], [`TaskState`])
//! - Request identity ([`Method`], [`Params`], [`CacheKey`])
//! - Error types ([`TaskError`], [`CoreError`])
//!
//! Response payloads are plain [`Payload`] values.

pub mod error;
pub mod models;

pub use error::{CoreError, TaskError};

pub use models::{CacheKey, CachePhase, Lifecycle, Method, Params, TaskState};

/// A parsed response payload.
pub type Payload = serde_json::Value;
