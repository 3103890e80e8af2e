//! Command implementations.

pub mod account;
pub mod completions;
pub mod records;
pub mod sync;
pub mod version;

use crate::config::{resolve_db_path, resolve_session_path};
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use std::path::{Path, PathBuf};

/// Open the vault database, creating it on first use.
pub(crate) fn open_storage(db_path: Option<&Path>) -> Result<SqliteStorage> {
    let db_path = resolve_db_path(db_path).ok_or_else(|| {
        Error::Config("cannot determine home directory; pass --db or set KEEPER_DB".into())
    })?;
    SqliteStorage::open(&db_path)
}

/// Path of the session envelope.
pub(crate) fn session_path(explicit: Option<&Path>) -> Result<PathBuf> {
    resolve_session_path(explicit).ok_or_else(|| {
        Error::Config(
            "cannot determine home directory; pass --session-file or set KEEPER_SESSION".into(),
        )
    })
}

/// Render epoch seconds for humans.
pub(crate) fn format_time(epoch: i64) -> String {
    chrono::DateTime::from_timestamp(epoch, 0)
        .map_or_else(|| epoch.to_string(), |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}
