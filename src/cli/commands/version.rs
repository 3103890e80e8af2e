//! Version command implementation.

use crate::error::Result;
use crate::storage::migrations;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput {
    version: &'static str,
    build: &'static str,
    schema: &'static str,
    migrations: usize,
}

fn version_info() -> VersionOutput {
    let (schema, migrations) = migrations::latest();
    VersionOutput {
        version: env!("CARGO_PKG_VERSION"),
        build: if cfg!(debug_assertions) {
            "dev"
        } else {
            "release"
        },
        schema,
        migrations,
    }
}

/// Print the binary version and the vault schema it writes.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let info = version_info();

    if json {
        println!("{}", serde_json::to_string(&info)?);
        return Ok(());
    }

    println!("keeper version {} ({})", info.version, info.build);
    println!("  vault schema: {} ({} migrations)", info.schema, info.migrations);
    Ok(())
}
