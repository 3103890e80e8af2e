//! Database migrations embedded at compile time.
//!
//! Migrations are sourced from `/migrations/` at the repo root and
//! embedded into the binary using `include_str!`. This ensures the
//! binary is self-contained with no runtime file dependencies.

use rusqlite::{Connection, Result};
use tracing::info;

/// A single migration with version identifier and SQL content.
struct Migration {
    version: &'static str,
    sql: &'static str,
}

/// All migrations in order, embedded at compile time.
///
/// Version names match the SQL filenames (without .sql extension).
/// The `schema_migrations` table tracks which have been applied.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "001_owner_tombstone_indexes",
        sql: include_str!("../../migrations/001_owner_tombstone_indexes.sql"),
    },
];

/// Version of the newest embedded migration and how many there are.
#[must_use]
pub fn latest() -> (&'static str, usize) {
    (
        MIGRATIONS.last().map_or("none", |m| m.version),
        MIGRATIONS.len(),
    )
}

/// Run all pending migrations on the database.
///
/// Migrations are applied in order, each inside its own transaction.
/// Already-applied migrations (tracked in the `schema_migrations` table)
/// are skipped, so this is safe to call on every database open.
///
/// # Errors
///
/// Returns an error if a migration fails to apply; that migration is
/// rolled back and not recorded.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let applied: std::collections::HashSet<String> = conn
        .prepare("SELECT version FROM schema_migrations")?
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    for migration in MIGRATIONS {
        if applied.contains(migration.version) {
            continue;
        }

        info!(version = migration.version, "Applying migration");

        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![migration.version, chrono::Utc::now().timestamp()],
        )?;
        tx.commit()?;

        info!(version = migration.version, "Migration complete");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::SCHEMA_SQL;

    /// Apply base schema before running migrations (mirrors production flow)
    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_SQL).expect("Base schema should apply");
        conn
    }

    fn migration_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .unwrap()
    }

    #[test]
    fn test_run_migrations_fresh_db() {
        let mut conn = setup_db();
        run_migrations(&mut conn).expect("Migrations should apply to fresh database");
        assert_eq!(migration_count(&conn), MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_run_migrations_idempotent() {
        let mut conn = setup_db();

        run_migrations(&mut conn).expect("First run should succeed");
        run_migrations(&mut conn).expect("Second run should succeed (idempotent)");

        assert_eq!(migration_count(&conn), MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_latest_names_last_migration() {
        let (version, count) = latest();
        assert_eq!(count, MIGRATIONS.len());
        assert_eq!(version, MIGRATIONS[MIGRATIONS.len() - 1].version);
    }

    #[test]
    fn test_migrations_leave_rows_untouched() {
        let mut conn = setup_db();
        conn.execute(
            "INSERT INTO logins (name, owner, login, secret, updated_at)
             VALUES ('bank', 1, 'alice', 'p1', 1704153845)",
            [],
        )
        .unwrap();

        run_migrations(&mut conn).unwrap();

        let (secret, updated_at): (String, i64) = conn
            .query_row(
                "SELECT secret, updated_at FROM logins WHERE name = 'bank'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(secret, "p1");
        assert_eq!(updated_at, 1_704_153_845);
    }

    #[test]
    fn test_owner_deleted_indexes_exist() {
        let mut conn = setup_db();
        run_migrations(&mut conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'index' AND name LIKE 'idx_%_owner_deleted'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 4);
    }
}
