//! Error types for Keeper.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=storage, 3=not_found, 4=validation, 5=auth, 6=sync, ...)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Keeper operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Storage (exit 2)
    StorageUnavailable,

    // Not Found (exit 3)
    NotFound,

    // Validation (exit 4)
    AlreadyExists,
    InvalidArgument,

    // Identity (exit 5)
    NotSignedIn,
    InvalidCredentials,
    DecryptionFailed,
    EnvelopeEmpty,
    RemoteAuthFailed,

    // Sync (exit 6)
    SyncFailed,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::StorageUnavailable => "STORAGE_UNAVAILABLE",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotSignedIn => "NOT_SIGNED_IN",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::DecryptionFailed => "DECRYPTION_FAILED",
            Self::EnvelopeEmpty => "ENVELOPE_EMPTY",
            Self::RemoteAuthFailed => "REMOTE_AUTH_FAILED",
            Self::SyncFailed => "SYNC_FAILED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
        }
    }

    /// Category-based exit code (2-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::StorageUnavailable => 2,
            Self::NotFound => 3,
            Self::AlreadyExists | Self::InvalidArgument => 4,
            Self::NotSignedIn
            | Self::InvalidCredentials
            | Self::DecryptionFailed
            | Self::EnvelopeEmpty
            | Self::RemoteAuthFailed => 5,
            Self::SyncFailed => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether retrying the same command may succeed without user action.
    ///
    /// True for a locked/unavailable database and for failed sync rounds,
    /// which leave local data untouched.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable | Self::SyncFailed | Self::RemoteAuthFailed
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in Keeper operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{entity} not found: {name}")]
    NotFound { entity: &'static str, name: String },

    #[error("{entity} already exists: {name}")]
    AlreadyExists { entity: &'static str, name: String },

    #[error("Session envelope could not be decrypted")]
    DecryptionFailed,

    #[error("Session envelope is empty")]
    EnvelopeEmpty,

    #[error("Not signed in (no session at {})", path.display())]
    NotSignedIn { path: PathBuf },

    #[error("Invalid login or password")]
    InvalidCredentials,

    #[error("Remote authentication failed: {0}")]
    RemoteAuthFailed(String),

    #[error("Sync failed: {0}")]
    SyncFailed(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] rusqlite::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::StorageUnavailable(err)
    }
}

/// True when `err` is a UNIQUE constraint violation.
#[must_use]
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            Self::DecryptionFailed => ErrorCode::DecryptionFailed,
            Self::EnvelopeEmpty => ErrorCode::EnvelopeEmpty,
            Self::NotSignedIn { .. } => ErrorCode::NotSignedIn,
            Self::InvalidCredentials => ErrorCode::InvalidCredentials,
            Self::RemoteAuthFailed(_) => ErrorCode::RemoteAuthFailed,
            Self::SyncFailed(_) => ErrorCode::SyncFailed,
            Self::StorageUnavailable(_) => ErrorCode::StorageUnavailable,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotFound { entity, .. } if *entity == "user" => Some(
                "No local account with that login. Create one: keeper register <login> <password>"
                    .to_string(),
            ),
            Self::NotFound { entity, .. } => Some(format!(
                "Use `keeper list {entity}` to see saved names."
            )),

            Self::AlreadyExists { entity, name } if *entity == "user" => Some(format!(
                "Login '{name}' is taken. Sign in instead: keeper login {name} <password>"
            )),
            Self::AlreadyExists { entity, name } => Some(format!(
                "Pick another name, or overwrite: keeper update {entity} {name} ..."
            )),

            Self::NotSignedIn { .. } => Some(
                "Sign in:  keeper login <login> <password>\n  \
                 Register: keeper register <login> <password>"
                    .to_string(),
            ),

            Self::DecryptionFailed | Self::EnvelopeEmpty => Some(
                "The session file is corrupt or was written by another build. \
                 Sign in again: keeper login <login> <password>"
                    .to_string(),
            ),

            Self::RemoteAuthFailed(_) => Some(
                "Check the server address (--server / KEEPER_SERVER) and your credentials. \
                 Local data was not changed."
                    .to_string(),
            ),

            Self::SyncFailed(_) => {
                Some("Local data was not changed. Run `keeper sync` again.".to_string())
            }

            Self::StorageUnavailable(_) => Some(
                "The database may be locked by another keeper process; retry shortly."
                    .to_string(),
            ),

            Self::InvalidCredentials
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Json(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
