//! API key generation and hashing.
//!
//! Keys are handed out once in clear text. Only the SHA-256 digest is
//! persisted, so lookups hash the presented key and compare digests.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Generate a new random API key.
#[must_use]
pub fn generate_api_key() -> String {
    // v4 carries no time component
    Uuid::new_v4().to_string()
}

/// Hash an API key for storage or lookup.
#[must_use]
pub fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.trim().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_api_key_is_unique() {
        let a = generate_api_key();
        let b = generate_api_key();

        assert_eq!(a.len(), 36);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_is_stable_and_hex() {
        let hash = hash_api_key("secret");

        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_api_key("secret"));
        assert_eq!(hash, hash_api_key("  secret\n"));
        assert_ne!(hash, hash_api_key("Secret"));
    }
}
