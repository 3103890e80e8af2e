//! Sealed session file.
//!
//! The cached [`Session`] is JSON-serialized and encrypted with AES-256-GCM
//! under a key compiled into the binary. Each seal draws a fresh random
//! 12-byte nonce and prepends it to the ciphertext.
//!
//! Layout of a sealed envelope:
//!   [ 12-byte nonce | ciphertext + 16-byte auth tag ]
//!
//! The key is a build-time constant, so the envelope only protects the
//! session against casual reading and tampering. Anyone holding the binary
//! can open it.

use std::path::Path;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use tracing::debug;

use crate::error::{Error, Result};
use crate::file::atomic_write;
use crate::model::Session;

/// Size of the AES-256-GCM nonce in bytes.
const NONCE_LEN: usize = 12;

/// Application key for session envelopes.
const ENVELOPE_KEY: [u8; 32] = [
    0x4b, 0x65, 0x65, 0x70, 0x9e, 0x31, 0xc2, 0x7a, 0x05, 0xd8, 0x6f, 0x13, 0xb4, 0x2e, 0x91, 0x5c,
    0xe7, 0x48, 0x0a, 0x63, 0xfd, 0x22, 0x8b, 0x1f, 0x76, 0xc9, 0x34, 0xa0, 0x5d, 0x12, 0xee, 0x87,
];

fn cipher() -> Aes256Gcm {
    Aes256Gcm::new(&ENVELOPE_KEY.into())
}

/// Seal a session into an envelope.
///
/// # Errors
///
/// Returns an error if the session cannot be serialized or encrypted.
pub fn seal(session: &Session) -> Result<Vec<u8>> {
    let plaintext = serde_json::to_vec(session)?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher()
        .encrypt(&nonce, plaintext.as_slice())
        .map_err(|e| std::io::Error::other(format!("cannot seal session: {e}")))?;

    let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    output.extend_from_slice(&nonce);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Open an envelope produced by [`seal`].
///
/// # Errors
///
/// Returns `DecryptionFailed` if the input is shorter than a nonce or the
/// authentication tag does not verify, `EnvelopeEmpty` if it decrypts to
/// nothing, and a JSON error if the plaintext is not a session.
pub fn open(sealed: &[u8]) -> Result<Session> {
    if sealed.len() < NONCE_LEN {
        return Err(Error::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let plaintext = cipher()
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| Error::DecryptionFailed)?;

    if plaintext.is_empty() {
        return Err(Error::EnvelopeEmpty);
    }

    Ok(serde_json::from_slice(&plaintext)?)
}

/// Seal `session` and write it to `path` atomically with owner-only
/// permissions. Nothing is written if sealing fails.
///
/// # Errors
///
/// Returns an error if sealing or writing fails.
pub fn write_session_file(path: &Path, session: &Session) -> Result<()> {
    let sealed = seal(session)?;
    atomic_write(path, &sealed, true)?;
    debug!(path = %path.display(), user_id = session.user_id, "Wrote session envelope");
    Ok(())
}

/// Read and open the session envelope at `path`.
///
/// # Errors
///
/// Returns `NotSignedIn` if the file does not exist, otherwise any error
/// from reading or [`open`].
pub fn read_session_file(path: &Path) -> Result<Session> {
    let sealed = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotSignedIn {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(e.into()),
    };
    open(&sealed)
}
