//! Vault users and the cached session identity.

use serde::{Deserialize, Serialize};

/// A locally registered vault user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub login: String,
    /// Argon2id PHC string.
    pub password_hash: String,
}

/// The identity cached in the session envelope.
///
/// Written once at sign-in/sign-up and read before every other command.
/// Never synchronized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: i64,
    pub login: String,
    /// Credential presented to the remote gateway.
    pub verifier: String,
}
