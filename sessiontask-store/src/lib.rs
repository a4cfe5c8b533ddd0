// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # SessionTask Store
//!
//! Disk persistence for SessionTask.
//!
//! This crate provides:
//!
//! - **FileCacheStore**: a [`CacheStore`](sessiontask_fetch::CacheStore) keeping
//!   one JSON file per cache key
//! - **Config**: loading and saving the [`NetworkConfig`](sessiontask_fetch::NetworkConfig)
//! - **Persistence**: file I/O helpers for JSON data
//!
//! ## Usage
//!
//! ```ignore
//! use sessiontask_fetch::TaskContext;
//! use sessiontask_store::{load_config, FileCacheStore};
//!
//! let config = load_config().await?;
//! let ctx = TaskContext::builder()
//!     .config(config)
//!     .cache(Arc::new(FileCacheStore::open_default()))
//!     .build();
//! ```

pub mod config;
pub mod error;
pub mod file_cache;
pub mod persistence;

pub use config::{load_config, load_config_from, save_config_to};
pub use error::StoreError;
pub use file_cache::{CacheEntry, FileCacheStore};
pub use persistence::{
    default_cache_dir, default_config_dir, default_config_path, ensure_dir, load_json,
    load_json_if_exists, save_json,
};
