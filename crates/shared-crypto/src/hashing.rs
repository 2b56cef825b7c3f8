//! # SHA-256 Hashing
//!
//! Digest helpers over `sha2`. All content ids in the node are SHA-256.

use sha2::{Digest, Sha256};
use shared_types::Hash;

/// Hashes `data` with SHA-256.
#[must_use]
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hashes `data` prefixed with a salt.
///
/// Used by caches that must not be probeable by peers replaying known ids.
#[must_use]
pub fn salted_digest(salt: u64, data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(salt.to_le_bytes());
    hasher.update(data);
    hasher.finalize().into()
}
