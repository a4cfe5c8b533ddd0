//! Cache key derivation.
//!
//! A task's cache key is a one-way digest of its absolute URL. The default
//! digest is SHA-256 rendered as 64 lowercase hex characters.

use ring::digest::{digest, SHA256};
use sessiontask_core::CacheKey;

/// Derives cache keys from absolute URLs.
pub trait KeyDigest: Send + Sync {
    /// Returns the key for `input`. Must be deterministic.
    fn digest(&self, input: &str) -> CacheKey;
}

/// SHA-256 digest, hex encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Digest;

impl KeyDigest for Sha256Digest {
    fn digest(&self, input: &str) -> CacheKey {
        CacheKey::new(hex::encode(digest(&SHA256, input.as_bytes())))
    }
}

/// Computes the default cache key for an absolute URL.
pub fn cache_key_for(absolute_url: &str) -> CacheKey {
    Sha256Digest.digest(absolute_url)
}
