//! Content fingerprinting for extraction deduplication.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 fingerprint of a byte buffer, hex-encoded.
///
/// The fingerprint is the identity key for the extraction cache: identical
/// bytes always produce the same fingerprint.
pub fn fingerprint_bytes(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let a = fingerprint_bytes(b"hello world");
        let b = fingerprint_bytes(b"hello world");
        assert_eq!(a, b);
        // SHA-256 of "hello world"
        assert_eq!(
            a,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn one_bit_difference_changes_fingerprint() {
        let original = b"hello world".to_vec();
        let mut flipped = original.clone();
        flipped[0] ^= 0x01;
        assert_ne!(fingerprint_bytes(&original), fingerprint_bytes(&flipped));
    }

    #[test]
    fn empty_input_has_well_known_digest() {
        assert_eq!(
            fingerprint_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
