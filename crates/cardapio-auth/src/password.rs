//! Login secret hashing with Argon2id
//!
//! Clients may already hash the password before sending it. The server does
//! not care: whatever arrives is treated as an opaque secret and only its
//! Argon2id hash is stored.

use std::sync::OnceLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Failed to verify password: {0}")]
    VerificationFailed(String),

    /// The stored value is not a PHC string
    #[error("Invalid password hash format: {0}")]
    InvalidHashFormat(String),
}

/// Hash a login secret into a PHC string (`$argon2id$v=19$...`) with a fresh
/// random salt.
///
/// ```
/// use cardapio_auth::password::{hash_password, verify_password};
///
/// let hash = hash_password("segredo").unwrap();
/// assert!(verify_password("segredo", &hash).unwrap());
/// ```
pub fn hash_password(secret: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
}

/// Check `secret` against a stored PHC hash.
///
/// A mismatch is `Ok(false)`; only a malformed hash or an internal failure
/// is an error.
pub fn verify_password(secret: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHashFormat(e.to_string()))?;

    match Argon2::default().verify_password(secret.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerificationFailed(e.to_string())),
    }
}

/// Run one verification against a throwaway hash.
///
/// Used when a login names an unknown email or a federated-only account, so
/// those rejections cost about as much time as a wrong password.
pub fn verify_against_dummy(secret: &str) {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();

    if let Some(hash) = DUMMY.get_or_init(|| hash_password("cardapio-dummy-secret").ok()) {
        let _ = verify_password(secret, hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_argon2id_phc_string() {
        let hash = hash_password("senha-do-restaurante").expect("Failed to hash password");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("v=19"));
        assert!(hash.contains("m="));
    }

    #[test]
    fn test_verify_matching_secret() {
        let hash = hash_password("senha-do-restaurante").unwrap();
        assert!(verify_password("senha-do-restaurante", &hash).unwrap());
    }

    #[test]
    fn test_verify_wrong_secret() {
        let hash = hash_password("senha-do-restaurante").unwrap();
        assert!(!verify_password("outra-senha", &hash).unwrap());
        assert!(!verify_password("SENHA-DO-RESTAURANTE", &hash).unwrap());
    }

    #[test]
    fn test_client_side_hash_is_just_a_secret() {
        // A hex digest sent by the browser is stored and checked like any other secret
        let digest = "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8";
        let hash = hash_password(digest).unwrap();

        assert!(verify_password(digest, &hash).unwrap());
        assert!(!verify_password("password", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_error() {
        let result = verify_password("qualquer", "not-a-phc-string");
        assert!(matches!(result, Err(PasswordError::InvalidHashFormat(_))));
    }

    #[test]
    fn test_salts_differ() {
        let first = hash_password("mesma").unwrap();
        let second = hash_password("mesma").unwrap();

        assert_ne!(first, second);
        assert!(verify_password("mesma", &first).unwrap());
        assert!(verify_password("mesma", &second).unwrap());
    }

    #[test]
    fn test_dummy_verification_does_not_panic() {
        verify_against_dummy("anything");
        verify_against_dummy("");
    }
}
