//! Account command implementations (register, login, logout, whoami).

use super::{open_storage, session_path};
use crate::auth;
use crate::error::Result;
use crate::session;
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

/// Output for register, login and whoami.
#[derive(Serialize)]
struct AccountOutput<'a> {
    user_id: i64,
    login: &'a str,
}

/// Output for logout.
#[derive(Serialize)]
struct LogoutOutput {
    signed_out: bool,
}

/// Create a local account and sign in as it.
///
/// # Errors
///
/// Returns `AlreadyExists` if the login is taken.
pub fn register(
    login: &str,
    password: &str,
    db_path: Option<&Path>,
    session_file: Option<&Path>,
    json: bool,
) -> Result<()> {
    let session_file = session_path(session_file)?;
    let mut storage = open_storage(db_path)?;

    let session = auth::register(&mut storage, login, password)?;
    session::persist(&session_file, &session)?;

    if json {
        let output = AccountOutput {
            user_id: session.user_id,
            login: &session.login,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!(
            "{} Registered and signed in as {}",
            "✓".green(),
            session.login.bold()
        );
    }
    Ok(())
}

/// Sign in to an existing local account.
///
/// # Errors
///
/// Returns `NotFound` or `InvalidCredentials` on a bad login.
pub fn login(
    login: &str,
    password: &str,
    db_path: Option<&Path>,
    session_file: Option<&Path>,
    json: bool,
) -> Result<()> {
    let session_file = session_path(session_file)?;
    let storage = open_storage(db_path)?;

    let session = auth::sign_in(&storage, login, password)?;
    session::persist(&session_file, &session)?;

    if json {
        let output = AccountOutput {
            user_id: session.user_id,
            login: &session.login,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{} Signed in as {}", "✓".green(), session.login.bold());
    }
    Ok(())
}

/// Remove the stored session.
///
/// # Errors
///
/// Returns an error if the session file cannot be removed.
pub fn logout(session_file: Option<&Path>, json: bool) -> Result<()> {
    let session_file = session_path(session_file)?;
    let signed_out = session::forget(&session_file)?;

    if json {
        println!("{}", serde_json::to_string(&LogoutOutput { signed_out })?);
    } else if signed_out {
        println!("Signed out");
    } else {
        println!("Not signed in");
    }
    Ok(())
}

/// Show the signed-in account.
///
/// # Errors
///
/// Returns `NotSignedIn` if there is no session.
pub fn whoami(session_file: Option<&Path>, json: bool) -> Result<()> {
    let session_file = session_path(session_file)?;
    let session = session::resolve(&session_file)?;

    if json {
        let output = AccountOutput {
            user_id: session.user_id,
            login: &session.login,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{} (user {})", session.login.bold(), session.user_id);
    }
    Ok(())
}
