//! Sync command implementation.

use super::{open_storage, session_path};
use crate::config::{resolve_server_url, resolve_timeout};
use crate::error::Result;
use crate::session;
use crate::sync::{HttpGateway, Reconciler, SyncReport};
use colored::Colorize;
use std::path::Path;

/// Run one reconciliation round against the configured server.
///
/// # Errors
///
/// Returns `RemoteAuthFailed` or `SyncFailed` if the round fails; local data
/// is unchanged in both cases.
pub fn execute(
    db_path: Option<&Path>,
    session_file: Option<&Path>,
    server: Option<&str>,
    timeout_secs: Option<u64>,
    json: bool,
) -> Result<()> {
    let session = session::resolve(&session_path(session_file)?)?;
    let timeout = resolve_timeout(timeout_secs)?;
    let server_url = resolve_server_url(server);
    let mut storage = open_storage(db_path)?;

    let gateway = HttpGateway::new(&server_url, timeout)?;
    let report = Reconciler::new(&mut storage, &gateway, &session).run()?;

    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        print_report(&server_url, &report);
    }
    Ok(())
}

fn print_report(server_url: &str, report: &SyncReport) {
    println!("{} Synced with {server_url}", "✓".green());
    if report.registered {
        println!("  Created remote account");
    }
    println!(
        "  Sent:     {} (logins {}, cards {}, texts {}, binaries {})",
        report.sent.total(),
        report.sent.logins,
        report.sent.cards,
        report.sent.texts,
        report.sent.binaries
    );
    println!(
        "  Received: {} (applied {}, kept local {})",
        report.received.total(),
        report.applied,
        report.skipped
    );
    if report.purge_failed {
        println!(
            "  {}",
            "Could not purge deleted records; they will be resent next sync".yellow()
        );
    } else if report.purged > 0 {
        println!("  Purged:   {} deleted record(s)", report.purged);
    }
}
