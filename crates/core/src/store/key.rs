//! Request identity for store entries.

use sha2::{Digest, Sha256};

/// Compute the store key for a request.
///
/// The identity is the upper-cased method plus the canonical URL. Callers
/// canonicalize the URL first; this function only hashes.
pub fn request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
