//! Content hashing helpers.
//!
//! Synthetic library labels embed a short digest of the originating jar
//! path so that distinct jars with the same file name never collide.

use sha2::{Digest, Sha256};

/// Length of the digest prefix embedded in synthetic labels.
pub const SHORT_DIGEST_LEN: usize = 7;

/// SHA-256 of a string, hex-encoded.
pub fn sha256_str(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

/// First [`SHORT_DIGEST_LEN`] hex chars of the SHA-256 of `s`.
pub fn short_digest(s: &str) -> String {
    let mut digest = sha256_str(s);
    digest.truncate(SHORT_DIGEST_LEN);
    digest
}
