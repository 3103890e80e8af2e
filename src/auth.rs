//! Local accounts.
//!
//! Passwords are stored as Argon2id PHC strings in the `users` table. The
//! remote never sees them: it is presented a deterministic [`verifier`]
//! derived from login and password instead.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::Session;
use crate::storage::SqliteStorage;

/// Salt length in bytes.
const SALT_LEN: usize = 16;

/// Create a local account and return its session.
///
/// # Errors
///
/// Returns `InvalidArgument` for an empty login or password and
/// `AlreadyExists` if the login is taken.
pub fn register(storage: &mut SqliteStorage, login: &str, password: &str) -> Result<Session> {
    check_input(login, password)?;

    let hash = hash_password(password)?;
    let user_id = storage.create_user(login, &hash)?;
    info!(login, user_id, "Registered local user");

    Ok(Session {
        user_id,
        login: login.to_string(),
        verifier: verifier(login, password),
    })
}

/// Verify a local account's password and return its session.
///
/// # Errors
///
/// Returns `NotFound` for an unknown login and `InvalidCredentials` for a
/// wrong password.
pub fn sign_in(storage: &SqliteStorage, login: &str, password: &str) -> Result<Session> {
    check_input(login, password)?;

    let user = storage.get_user(login)?;
    if !verify_password(password, &user.password_hash)? {
        debug!(login, "Password mismatch");
        return Err(Error::InvalidCredentials);
    }

    Ok(Session {
        user_id: user.id,
        login: user.login,
        verifier: verifier(login, password),
    })
}

/// Credential presented to the remote: `hex(sha256(login ":" password))`.
#[must_use]
pub fn verifier(login: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(login.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash a password into an Argon2id PHC string with a fresh random salt.
///
/// # Errors
///
/// Returns an error if hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt)
        .map_err(|e| Error::InvalidArgument(format!("salt encoding failed: {e}")))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::InvalidArgument(format!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Check `password` against a stored PHC string.
///
/// # Errors
///
/// Returns `InvalidCredentials` if the stored hash cannot be parsed.
pub fn verify_password(password: &str, phc: &str) -> Result<bool> {
    let parsed = PasswordHash::new(phc).map_err(|_| Error::InvalidCredentials)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn check_input(login: &str, password: &str) -> Result<()> {
    if login.trim().is_empty() {
        return Err(Error::InvalidArgument("login must not be empty".into()));
    }
    if password.is_empty() {
        return Err(Error::InvalidArgument("password must not be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_then_sign_in() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let registered = register(&mut storage, "alice", "hunter2").unwrap();
        let signed_in = sign_in(&storage, "alice", "hunter2").unwrap();

        assert_eq!(registered, signed_in);
        assert_ne!(signed_in.verifier, "hunter2");
    }

    #[test]
    fn test_wrong_password() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        register(&mut storage, "alice", "hunter2").unwrap();

        let err = sign_in(&storage, "alice", "nope").unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));
    }

    #[test]
    fn test_unknown_login_and_duplicate() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert!(matches!(
            sign_in(&storage, "ghost", "pw").unwrap_err(),
            Error::NotFound { entity: "user", .. }
        ));

        register(&mut storage, "alice", "a").unwrap();
        assert!(matches!(
            register(&mut storage, "alice", "b").unwrap_err(),
            Error::AlreadyExists { entity: "user", .. }
        ));
    }

    #[test]
    fn test_empty_input_rejected() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert!(matches!(
            register(&mut storage, " ", "pw").unwrap_err(),
            Error::InvalidArgument(_)
        ));
        assert!(matches!(
            register(&mut storage, "alice", "").unwrap_err(),
            Error::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_verifier_is_stable_and_salted_hash_is_not() {
        assert_eq!(verifier("alice", "pw"), verifier("alice", "pw"));
        assert_ne!(verifier("alice", "pw"), verifier("bob", "pw"));
        assert_eq!(verifier("alice", "pw").len(), 64);

        let a = hash_password("pw").unwrap();
        let b = hash_password("pw").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2id$"));
        assert!(verify_password("pw", &b).unwrap());
    }
}
