//! Content and prompt fingerprinting.
//!
//! SHA-256 is used wherever a collision must be practically impossible
//! (cross-URL content dedup, chunk dedup). MD5 is used for cache keys, where
//! the cost of a collision is a cache miss and no security property depends
//! on the digest.

use md5::{Digest as Md5Digest, Md5};
use sha2::{Digest as Sha2Digest, Sha256};

/// Lowercase hex SHA-256 of UTF-8 content.
pub fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Lowercase hex SHA-256 of raw bytes.
pub fn sha256_hex_bytes(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Lowercase hex MD5 (32 chars) of UTF-8 content, used for cache keys only.
pub fn md5_hex(content: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_is_deterministic() {
        let a = sha256_hex("Apply for a passport");
        let b = sha256_hex("Apply for a passport");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn sha256_changes_with_content() {
        assert_ne!(sha256_hex("a"), sha256_hex("b"));
    }

    #[test]
    fn md5_is_32_hex_chars() {
        let digest = md5_hex("document-id|source-hash|grade8");
        assert_eq!(digest.len(), 32);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn md5_is_deterministic() {
        assert_eq!(md5_hex("same-input"), md5_hex("same-input"));
    }
}
