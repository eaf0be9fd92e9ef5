//! Password hash verification
//!
//! Device passwords are stored as PHC strings. Verification is behind
//! [`PasswordVerifier`] so the hash algorithm can be swapped without touching
//! the authenticator; the default is Argon2id.

use crate::error::{AuthHookError, Result};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString},
    Argon2,
};

/// Compares a plaintext secret with a stored hash
pub trait PasswordVerifier: Send + Sync {
    /// `Ok(false)` for a wrong password, `Err` if the stored hash is unusable
    fn verify(&self, password: &str, passhash: &str) -> Result<bool>;
}

/// Argon2 verifier. Parameters are read from each stored hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Verifier;

impl PasswordVerifier for Argon2Verifier {
    fn verify(&self, password: &str, passhash: &str) -> Result<bool> {
        verify_password(password, passhash)
    }
}

/// Hash a password with Argon2id default parameters
///
/// Returns the hash in PHC format: `$argon2id$v=19$m=...,t=...,p=...$salt$hash`
pub fn hash_password(password: &str) -> Result<String> {
    hash_password_with(&Argon2::default(), password)
}

/// Hash a password with a caller-supplied Argon2 context
pub fn hash_password_with(argon2: &Argon2<'_>, password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthHookError::InvalidPasswordHash(format!("password hash failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored PHC hash
pub fn verify_password(password: &str, passhash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(passhash)
        .map_err(|e| AuthHookError::InvalidPasswordHash(e.to_string()))?;

    match parsed_hash.verify_password(&[&Argon2::default()], password) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthHookError::InvalidPasswordHash(format!(
            "password verification failed: {}",
            e
        ))),
    }
}
