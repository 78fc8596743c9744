use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;

use crate::error::{AuthError, AuthResult};

/// Hashes `password` with a fresh random salt. The returned PHC string embeds
/// the salt and parameters needed to verify later.
pub fn hash_password(password: &str) -> AuthResult<String> {
    if password.trim().is_empty() {
        return Err(AuthError::EmptyPassword);
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Hash(err.to_string()))
}

/// Checks `password` against a stored PHC string using the stored salt and
/// parameters. A mismatch is `Ok(false)`; an unparseable hash is an error.
pub fn verify_password(stored_hash: &str, password: &str) -> AuthResult<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|err| AuthError::Hash(err.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(err) => Err(AuthError::Hash(err.to_string())),
    }
}
