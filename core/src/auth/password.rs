// core/src/auth/password.rs

//! Argon2id password hashing. Both functions are CPU-bound; async callers run
//! them on the blocking pool.

use crate::error::{AuthError, Error, Result};
use argon2::{
  password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Argon2,
};
use rand_core::OsRng;
use tracing::{debug, error, instrument};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Hashes `password` with a fresh random salt and the default Argon2id cost.
#[instrument(name = "auth::hash_password", skip(password), err(Display))]
pub fn hash_password(password: &str) -> Result<String> {
  if password.is_empty() {
    return Err(Error::validation("password cannot be empty"));
  }

  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|argon_err| {
      error!(error = %argon_err, "argon2 hashing failed");
      Error::Auth(AuthError::AuthenticationFailed)
    })
}

/// Checks `provided` against a stored PHC hash string.
///
/// `Ok(false)` means the password is wrong. A stored hash that does not parse
/// is an error, not a mismatch.
#[instrument(name = "auth::verify_password", skip_all, err(Display))]
pub fn verify_password(stored_hash: &str, provided: &str) -> Result<bool> {
  if provided.is_empty() {
    return Ok(false);
  }

  let parsed_hash = PasswordHash::new(stored_hash).map_err(|parse_err| {
    error!(error = %parse_err, "stored password hash is malformed");
    Error::Auth(AuthError::AuthenticationFailed)
  })?;

  match Argon2::default().verify_password(provided.as_bytes(), &parsed_hash) {
    Ok(()) => Ok(true),
    Err(argon2::password_hash::Error::Password) => {
      debug!("password mismatch");
      Ok(false)
    }
    Err(other) => {
      error!(error = %other, "argon2 verification failed");
      Err(Error::Auth(AuthError::AuthenticationFailed))
    }
  }
}

/// Runs `verify_password` on the blocking pool.
pub async fn verify_password_blocking(stored_hash: String, provided: String) -> Result<bool> {
  tokio::task::spawn_blocking(move || verify_password(&stored_hash, &provided))
    .await
    .map_err(|join_err| {
      error!(error = %join_err, "password verification task failed");
      Error::Auth(AuthError::AuthenticationFailed)
    })?
}

pub async fn hash_password_blocking(password: String) -> Result<String> {
  tokio::task::spawn_blocking(move || hash_password(&password))
    .await
    .map_err(|join_err| {
      error!(error = %join_err, "password hashing task failed");
      Error::Auth(AuthError::AuthenticationFailed)
    })?
}
