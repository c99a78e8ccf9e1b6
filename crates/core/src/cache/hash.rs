//! Request identity for cache entries.

use sha2::{Digest, Sha256};

/// Compute the entry key for a request identity.
///
/// Partitions only ever hold GET entries, but the method stays part of the
/// identity so a key can never be confused across methods.
pub fn compute_entry_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
