//! The remote seam.

use super::types::{GatewayError, SyncPayload, Token};

/// A remote that stores a copy of each user's vault.
///
/// `sync` must merge the incoming payload last-write-wins per name (strictly
/// newer replaces, absent is inserted) and return the remote's full current
/// record set for the authenticated user.
pub trait RemoteGateway {
    /// Exchange credentials for a token.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownUser`] if the remote has no account for
    /// `login`.
    fn authenticate(&self, login: &str, verifier: &str) -> Result<Token, GatewayError>;

    /// Create a remote account and return its token.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Rejected`] if the login is already taken.
    fn register(&self, login: &str, verifier: &str) -> Result<Token, GatewayError>;

    /// Push the local record set and receive the merged remote set.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails; the remote may or may not
    /// have applied the payload.
    fn sync(&self, token: &Token, payload: &SyncPayload) -> Result<SyncPayload, GatewayError>;
}
