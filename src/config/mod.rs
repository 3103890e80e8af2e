//! Configuration management.
//!
//! Every setting resolves with the same priority:
//! 1. Explicit CLI flag (clap also fills these from `KEEPER_*` variables)
//! 2. Environment variable, including the legacy `DATA_BASE_PATH` and
//!    `SERVER_ADDR` names
//! 3. Default under `~/.keeper/`
//!
//! Resolution is split into pure `*_with` functions that take an environment
//! lookup, so it can be tested without touching the process environment.

use crate::error::{Error, Result};

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default remote address.
pub const DEFAULT_SERVER: &str = "http://localhost:8080";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Get the Keeper home directory, `~/.keeper/`.
#[must_use]
pub fn keeper_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".keeper"))
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `KEEPER_DB` environment variable
/// 3. `DATA_BASE_PATH` environment variable (legacy)
/// 4. `~/.keeper/keeper.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    resolve_db_path_with(explicit_path, process_env, keeper_dir())
}

fn resolve_db_path_with(
    explicit_path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
    home: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    non_empty(env("KEEPER_DB"))
        .or_else(|| non_empty(env("DATA_BASE_PATH")))
        .map(PathBuf::from)
        .or_else(|| home.map(|dir| dir.join("keeper.db")))
}

/// Resolve the session envelope path.
///
/// Priority: explicit path, `KEEPER_SESSION`, then `~/.keeper/session`.
#[must_use]
pub fn resolve_session_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    resolve_session_path_with(explicit_path, process_env, keeper_dir())
}

fn resolve_session_path_with(
    explicit_path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
    home: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    non_empty(env("KEEPER_SESSION"))
        .map(PathBuf::from)
        .or_else(|| home.map(|dir| dir.join("session")))
}

/// Resolve the remote base URL.
///
/// Priority: explicit value, `KEEPER_SERVER`, `SERVER_ADDR` (legacy), then
/// [`DEFAULT_SERVER`]. A bare `host:port` gets an `http://` scheme.
#[must_use]
pub fn resolve_server_url(explicit: Option<&str>) -> String {
    resolve_server_url_with(explicit, process_env)
}

fn resolve_server_url_with(explicit: Option<&str>, env: impl Fn(&str) -> Option<String>) -> String {
    let raw = explicit
        .map(str::to_string)
        .or_else(|| non_empty(env("KEEPER_SERVER")))
        .or_else(|| non_empty(env("SERVER_ADDR")))
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());

    let raw = raw.trim().trim_end_matches('/');
    if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    }
}

/// Resolve the remote request timeout.
///
/// Priority: explicit seconds, `KEEPER_TIMEOUT_SECS`, then
/// [`DEFAULT_TIMEOUT_SECS`].
///
/// # Errors
///
/// Returns `Config` if the value is zero or not a number.
pub fn resolve_timeout(explicit_secs: Option<u64>) -> Result<Duration> {
    resolve_timeout_with(explicit_secs, process_env)
}

fn resolve_timeout_with(
    explicit_secs: Option<u64>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Duration> {
    let secs = match explicit_secs {
        Some(secs) => secs,
        None => match non_empty(env("KEEPER_TIMEOUT_SECS")) {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!("KEEPER_TIMEOUT_SECS is not a number: {raw}"))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        },
    };

    if secs == 0 {
        return Err(Error::Config("timeout must be at least 1 second".into()));
    }
    Ok(Duration::from_secs(secs))
}
