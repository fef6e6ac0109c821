use base64::Engine;
use sha2::{Digest, Sha256};

/// SHA-256 of the report text, base64 encoded. Stored with each report so
/// resubmissions of the same document can be recognized.
pub fn content_hash(text: &str) -> String {
    let hash = Sha256::digest(text.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_deterministic() {
        assert_eq!(content_hash("Cholesterol: 260"), content_hash("Cholesterol: 260"));
    }

    #[test]
    fn different_text_different_hash() {
        assert_ne!(content_hash("Cholesterol: 260"), content_hash("Cholesterol: 261"));
    }

    #[test]
    fn hash_is_base64_sha256() {
        // 32 bytes encode to 44 base64 characters.
        assert_eq!(content_hash("").len(), 44);
        assert_eq!(content_hash(""), "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=");
    }
}
