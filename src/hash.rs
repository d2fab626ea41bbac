// src/hash.rs

//! Fingerprints for exported content and relational records
//!
//! Two algorithms are in use:
//! - **SHA-256** fingerprints the stable identity of relational export
//!   records (datasets). Collisions there would silently drop data, so the
//!   cryptographic hash is required.
//! - **XXH128** digests resource bodies for reports and archive
//!   verification, where only accidental corruption needs to be caught.

use sha2::{Digest, Sha256};
use xxhash_rust::xxh3::xxh3_128;

/// XXH128 hex digest
#[inline]
pub fn xxh128(data: &[u8]) -> String {
    format!("{:032x}", xxh3_128(data))
}

/// Fingerprint a logical record by its identity components
///
/// Components are length-prefixed before hashing so that `["ab", "c"]` and
/// `["a", "bc"]` never collide.
pub fn identity_fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xxh128_length() {
        assert_eq!(xxh128(b"").len(), 32);
        assert_eq!(xxh128(b"payload").len(), 32);
        assert_ne!(xxh128(b"payload"), xxh128(b"payloaD"));
    }

    #[test]
    fn test_identity_fingerprint_is_unambiguous() {
        let a = identity_fingerprint(&["ab", "c"]);
        let b = identity_fingerprint(&["a", "bc"]);
        assert_ne!(a, b);
        assert_eq!(a, identity_fingerprint(&["ab", "c"]));
        assert_eq!(a.len(), 64);
    }
}
