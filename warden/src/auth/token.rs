//! Opaque bearer token generation.
//!
//! Tokens are random bytes from the OS, base64url encoded without padding. Only the
//! SHA-256 digest of a token is ever persisted, so a leaked table does not hand out
//! working credentials.

use argon2::password_hash::rand_core::{OsRng, RngCore};
use base64::{Engine as _, engine::general_purpose};
use sha2::{Digest, Sha256};

use crate::errors::Error;

/// Generate a token from `byte_length` bytes of OS randomness.
pub fn generate_token(byte_length: usize) -> Result<String, Error> {
    if byte_length == 0 {
        return Err(Error::Internal {
            operation: "generate token: byte length must be positive".to_string(),
        });
    }

    let mut bytes = vec![0u8; byte_length];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| Error::EntropyUnavailable { message: e.to_string() })?;

    Ok(general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Digest under which a token is stored and looked up.
pub fn hash_token(token: &str) -> Vec<u8> {
    Sha256::digest(token.as_bytes()).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn is_url_safe(token: &str) -> bool {
        token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    #[test]
    fn test_generate_token_length_and_alphabet() {
        let token = generate_token(32).unwrap();

        // 32 bytes -> 43 base64url chars, no padding
        assert_eq!(token.len(), 43);
        assert!(is_url_safe(&token));
        assert!(!token.contains('='));

        assert_eq!(generate_token(16).unwrap().len(), 22);
    }

    #[test]
    fn test_tokens_do_not_collide() {
        let tokens: HashSet<String> = (0..10_000).map(|_| generate_token(16).unwrap()).collect();
        assert_eq!(tokens.len(), 10_000);
        assert!(tokens.iter().all(|t| is_url_safe(t)));
    }

    #[test]
    fn test_zero_length_is_rejected() {
        assert!(matches!(generate_token(0), Err(Error::Internal { .. })));
    }

    #[test]
    fn test_hash_token_is_stable_sha256() {
        let a = hash_token("abc");
        assert_eq!(a.len(), 32);
        assert_eq!(a, hash_token("abc"));
        assert_ne!(a, hash_token("abd"));
    }
}
