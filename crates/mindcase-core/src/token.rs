use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use sha2::{Digest, Sha256};

/// Opaque token handling for refresh tokens.
///
/// Raw tokens are 32 bytes from the OS CSPRNG, base64url-encoded for transport.
/// Only the SHA-256 hash (lowercase hex) is ever persisted, so a database read
/// alone cannot be replayed against the refresh endpoint.

pub fn generate_opaque_token() -> String {
    let token_bytes = rand::random::<[u8; 32]>();
    URL_SAFE_NO_PAD.encode(token_bytes)
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_unique_and_url_safe() {
        let a = generate_opaque_token();
        let b = generate_opaque_token();
        assert_ne!(a, b);
        assert!(a.len() >= 43);
        assert!(!a.contains('+') && !a.contains('/') && !a.contains('='));
    }

    #[test]
    fn test_hash_is_stable_hex() {
        let h = hash_token("fixed-input");
        assert_eq!(h, hash_token("fixed-input"));
        assert_eq!(h.len(), 64);
        assert!(h.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_ne!(h, hash_token("other-input"));
    }
}
