//! Session resolution.
//!
//! Every command that touches records needs the signed-in identity. It is
//! read from the sealed session file on each invocation; nothing is cached
//! in process.

use std::path::Path;

use tracing::{debug, info};

use crate::envelope;
use crate::error::Result;
use crate::file::remove_if_exists;
use crate::model::Session;

/// Load the current session.
///
/// # Errors
///
/// Returns `NotSignedIn` if no session file exists, or an envelope error
/// if it cannot be opened.
pub fn resolve(path: &Path) -> Result<Session> {
    let session = envelope::read_session_file(path)?;
    debug!(user_id = session.user_id, login = %session.login, "Resolved session");
    Ok(session)
}

/// Replace the stored session.
///
/// # Errors
///
/// Returns an error if the envelope cannot be written.
pub fn persist(path: &Path, session: &Session) -> Result<()> {
    envelope::write_session_file(path, session)?;
    info!(login = %session.login, "Signed in");
    Ok(())
}

/// Remove the stored session. Returns `false` if there was none.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed.
pub fn forget(path: &Path) -> Result<bool> {
    let removed = remove_if_exists(path)?;
    if removed {
        info!("Signed out");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    #[test]
    fn test_persist_resolve_forget() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session");
        let session = Session {
            user_id: 3,
            login: "carol".into(),
            verifier: "v".into(),
        };

        persist(&path, &session).unwrap();
        assert_eq!(resolve(&path).unwrap(), session);

        assert!(forget(&path).unwrap());
        assert!(!forget(&path).unwrap());
        assert!(matches!(resolve(&path), Err(Error::NotSignedIn { .. })));
    }

    #[test]
    fn test_relogin_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session");
        let first = Session {
            user_id: 1,
            login: "a".into(),
            verifier: "x".into(),
        };
        let second = Session {
            user_id: 2,
            login: "b".into(),
            verifier: "y".into(),
        };

        persist(&path, &first).unwrap();
        persist(&path, &second).unwrap();
        assert_eq!(resolve(&path).unwrap(), second);
    }

    #[test]
    fn test_garbage_file_is_decryption_failure() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session");
        std::fs::write(&path, b"not an envelope at all").unwrap();

        assert!(matches!(resolve(&path), Err(Error::DecryptionFailed)));
    }
}
