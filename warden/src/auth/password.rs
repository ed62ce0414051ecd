//! Password hashing, verification and policy.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::config::PasswordConfig;
use crate::errors::Error;

/// Argon2 hashing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    /// Create Argon2 instance with these parameters.
    fn to_argon2(self) -> Result<Argon2<'static>, Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None).map_err(|e| Error::HashingFailure {
            operation: format!("create argon2 params: {e}"),
        })?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for Argon2Params {
    /// Secure defaults for production (Argon2id RFC recommendations)
    fn default() -> Self {
        Self {
            memory_kib: 19456, // 19 MB
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl From<&PasswordConfig> for Argon2Params {
    fn from(config: &PasswordConfig) -> Self {
        Self {
            memory_kib: config.argon2_memory_kib,
            iterations: config.argon2_iterations,
            parallelism: config.argon2_parallelism,
        }
    }
}

/// Hash a password with a fresh random salt.
///
/// CPU bound: callers on the async runtime should run this inside `spawn_blocking`.
pub fn hash_password(plaintext: &str, params: Argon2Params) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = params.to_argon2()?;

    let hash = argon2.hash_password(plaintext.as_bytes(), &salt).map_err(|e| Error::HashingFailure {
        operation: format!("hash password: {e}"),
    })?;

    Ok(hash.to_string())
}

/// Verify a password against a stored PHC hash string.
///
/// A mismatch is `Ok(false)`. Only an unparseable hash is an error.
/// Verification uses the parameters embedded in the hash itself.
pub fn verify_password(plaintext: &str, hash: &str) -> Result<bool, Error> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| Error::HashingFailure {
        operation: format!("parse hash: {e}"),
    })?;

    let argon2 = Argon2::default();
    Ok(argon2.verify_password(plaintext.as_bytes(), &parsed_hash).is_ok())
}

/// Check a candidate password against the configured length policy.
pub fn check_policy(plaintext: &str, config: &PasswordConfig) -> Result<(), Error> {
    if plaintext.is_empty() {
        return Err(Error::WeakCredential {
            message: "Password must not be empty".to_string(),
        });
    }

    let length = plaintext.chars().count();
    if length < config.min_length {
        return Err(Error::WeakCredential {
            message: format!("Password must be at least {} characters long", config.min_length),
        });
    }
    if length > config.max_length {
        return Err(Error::WeakCredential {
            message: format!("Password must be no more than {} characters long", config.max_length),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Argon2Params {
        Argon2Params {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_password_hashing() {
        let input = "test_password_123";
        let hash = hash_password(input, cheap()).unwrap();

        assert!(!hash.is_empty());
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains(input));

        assert!(verify_password(input, &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_same_input_different_hashes() {
        let input = "same_password";

        let hash1 = hash_password(input, cheap()).unwrap();
        let hash2 = hash_password(input, cheap()).unwrap();

        // Salted, so never equal
        assert_ne!(hash1, hash2);
        assert!(verify_password(input, &hash1).unwrap());
        assert!(verify_password(input, &hash2).unwrap());
    }

    #[test]
    fn test_verify_is_false_for_many_wrong_passwords() {
        let hash = hash_password("pw123", cheap()).unwrap();
        for candidate in ["pw124", "PW123", "pw123 ", "", "321wp"] {
            assert!(!verify_password(candidate, &hash).unwrap(), "{candidate} should not verify");
        }
    }

    #[test]
    fn test_malformed_hash_is_hashing_failure() {
        let err = verify_password("pw123", "not-a-phc-string").unwrap_err();
        assert!(matches!(err, Error::HashingFailure { .. }));
    }

    #[test]
    fn test_invalid_params_are_hashing_failure() {
        let params = Argon2Params {
            memory_kib: 1,
            iterations: 0,
            parallelism: 0,
        };
        assert!(matches!(hash_password("pw", params), Err(Error::HashingFailure { .. })));
    }

    #[test]
    fn test_policy() {
        let config = PasswordConfig {
            min_length: 5,
            max_length: 10,
            ..Default::default()
        };

        assert!(matches!(check_policy("", &config), Err(Error::WeakCredential { .. })));
        assert!(matches!(check_policy("abcd", &config), Err(Error::WeakCredential { .. })));
        assert!(matches!(check_policy("abcdefghijk", &config), Err(Error::WeakCredential { .. })));
        assert!(check_policy("pw123", &config).is_ok());
        // Length is measured in characters, not bytes
        assert!(check_policy("ééééé", &config).is_ok());
    }
}
