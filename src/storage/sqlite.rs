//! SQLite storage implementation.
//!
//! This module provides the local record store for Keeper. All writes go
//! through [`SqliteStorage::mutate`] so each operation runs in a single
//! IMMEDIATE transaction.

use crate::error::{is_unique_violation, Error, Result};
use crate::model::{Record, RecordKind, Snapshot, User};
use crate::storage::migrations::run_migrations;
use crate::storage::rows::{placeholders, read_record, select_list, TableRow};
use crate::storage::schema::apply_schema;
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
    clock: fn() -> i64,
}

/// Outcome of [`SqliteStorage::apply_merged`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ApplyStats {
    /// Rows inserted or overwritten.
    pub applied: usize,
    /// Rows ignored because the local copy was newer.
    pub skipped: usize,
}

impl ApplyStats {
    fn absorb(&mut self, other: Self) {
        self.applied += other.applied;
        self.skipped += other.skipped;
    }
}

fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database, applies the schema and runs pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        conn.pragma_update(None, "journal_mode", "WAL")?;
        apply_schema(&conn)?;
        run_migrations(&mut conn)?;

        debug!(path = %path.display(), "Opened vault database");
        Ok(Self {
            conn,
            clock: now_epoch,
        })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        run_migrations(&mut conn)?;
        Ok(Self {
            conn,
            clock: now_epoch,
        })
    }

    /// Replace the clock used to stamp `updated_at`.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }

    /// Execute a mutation inside an IMMEDIATE transaction.
    ///
    /// Commits when the closure succeeds; any error rolls everything back.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let result = f(&tx)?;
        tx.commit()?;

        debug!(op, "Committed");
        Ok(result)
    }

    // ==================
    // User Operations
    // ==================

    /// Create a local user.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the login is taken.
    pub fn create_user(&mut self, login: &str, password_hash: &str) -> Result<i64> {
        self.mutate("create_user", |tx| {
            tx.execute(
                "INSERT INTO users (login, password_hash) VALUES (?1, ?2)",
                rusqlite::params![login, password_hash],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::AlreadyExists {
                        entity: "user",
                        name: login.to_string(),
                    }
                } else {
                    e.into()
                }
            })?;
            Ok(tx.last_insert_rowid())
        })
    }

    /// Look up a user by login.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such user exists.
    pub fn get_user(&self, login: &str) -> Result<User> {
        self.conn
            .query_row(
                "SELECT id, login, password_hash FROM users WHERE login = ?1",
                [login],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        login: row.get(1)?,
                        password_hash: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| Error::NotFound {
                entity: "user",
                name: login.to_string(),
            })
    }

    // ==================
    // Record Operations
    // ==================

    /// Insert a new live record stamped with the current time.
    ///
    /// Returns the SQLite rowid.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the owner already has a row (live or
    /// tombstone) with this name.
    pub fn save<P: TableRow>(&mut self, record: &Record<P>) -> Result<i64> {
        let now = self.now();
        let table = P::KIND.table();
        let sql = format!(
            "INSERT INTO {table} (name, owner, {}, deleted, updated_at)
             VALUES (?1, ?2, {}, 0, ?{})",
            P::COLUMNS.join(", "),
            placeholders(3, P::COLUMNS.len()),
            3 + P::COLUMNS.len(),
        );

        let id = self.mutate("save", |tx| {
            let mut values: Vec<&dyn ToSql> = vec![&record.name, &record.owner];
            values.extend(record.payload.params());
            values.push(&now);

            tx.execute(&sql, values.as_slice()).map_err(|e| {
                if is_unique_violation(&e) {
                    Error::AlreadyExists {
                        entity: P::KIND.label(),
                        name: record.name.clone(),
                    }
                } else {
                    e.into()
                }
            })?;
            Ok(tx.last_insert_rowid())
        })?;

        debug!(kind = %P::KIND, name = %record.name, id, "Saved record");
        Ok(id)
    }

    /// Overwrite the payload of an existing row and refresh its timestamp.
    ///
    /// Returns `false` (and changes nothing) when the owner has no row with
    /// this name. A tombstoned row is overwritten but stays a tombstone.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub fn update<P: TableRow>(&mut self, record: &Record<P>) -> Result<bool> {
        let now = self.now();
        let table = P::KIND.table();
        let n = P::COLUMNS.len();
        let assignments = P::COLUMNS
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{col} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {table} SET {assignments}, updated_at = ?{}
             WHERE owner = ?{} AND name = ?{}",
            n + 1,
            n + 2,
            n + 3,
        );

        let changed = self.mutate("update", |tx| {
            let mut values = record.payload.params();
            values.push(&now);
            values.push(&record.owner);
            values.push(&record.name);
            Ok(tx.execute(&sql, values.as_slice())?)
        })?;

        if changed == 0 {
            debug!(kind = %P::KIND, name = %record.name, "Update matched no row");
        }
        Ok(changed > 0)
    }

    /// Fetch one live record by name.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is no live row with this name.
    pub fn get_by_name<P: TableRow>(&self, owner: i64, name: &str) -> Result<Record<P>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE owner = ?1 AND name = ?2 AND deleted = 0",
            select_list::<P>(),
            P::KIND.table(),
        );
        self.conn
            .query_row(&sql, rusqlite::params![owner, name], read_record::<P>)
            .optional()?
            .ok_or_else(|| Error::NotFound {
                entity: P::KIND.label(),
                name: name.to_string(),
            })
    }

    /// All live records of one kind, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_all<P: TableRow>(&self, owner: i64) -> Result<Vec<Record<P>>> {
        self.query_rows(owner, false)
    }

    /// Soft-delete a record.
    ///
    /// Returns `true` if a live row was tombstoned; deleting a missing or
    /// already-deleted name is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub fn delete(&mut self, kind: RecordKind, owner: i64, name: &str) -> Result<bool> {
        let now = self.now();
        let sql = format!(
            "UPDATE {} SET deleted = 1, updated_at = ?3
             WHERE owner = ?1 AND name = ?2 AND deleted = 0",
            kind.table()
        );
        let changed = self.mutate("delete", |tx| {
            Ok(tx.execute(&sql, rusqlite::params![owner, name, now])?)
        })?;

        debug!(%kind, name, tombstoned = changed > 0, "Delete");
        Ok(changed > 0)
    }

    /// Every row of every kind for `owner`, tombstones included.
    ///
    /// # Errors
    ///
    /// Returns an error if any query fails.
    pub fn snapshot(&self, owner: i64) -> Result<Snapshot> {
        Ok(Snapshot {
            logins: self.query_rows(owner, true)?,
            cards: self.query_rows(owner, true)?,
            texts: self.query_rows(owner, true)?,
            binaries: self.query_rows(owner, true)?,
        })
    }

    /// Upsert every row of `snapshot`, keeping the local row when it is newer.
    ///
    /// Runs in one transaction: either all rows are considered or none are.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is applied in that case.
    pub fn apply_merged(&mut self, snapshot: &Snapshot) -> Result<ApplyStats> {
        let stats = self.mutate("apply_merged", |tx| {
            let mut stats = ApplyStats::default();
            stats.absorb(upsert_rows(tx, &snapshot.logins)?);
            stats.absorb(upsert_rows(tx, &snapshot.cards)?);
            stats.absorb(upsert_rows(tx, &snapshot.texts)?);
            stats.absorb(upsert_rows(tx, &snapshot.binaries)?);
            Ok(stats)
        })?;

        debug!(applied = stats.applied, skipped = stats.skipped, "Applied merged snapshot");
        Ok(stats)
    }

    /// Physically remove every tombstone owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if any delete fails; nothing is removed in that case.
    pub fn purge_deleted(&mut self, owner: i64) -> Result<usize> {
        let purged = self.mutate("purge_deleted", |tx| {
            let mut total = 0;
            for kind in RecordKind::ALL {
                total += tx.execute(
                    &format!("DELETE FROM {} WHERE owner = ?1 AND deleted = 1", kind.table()),
                    [owner],
                )?;
            }
            Ok(total)
        })?;

        debug!(owner, purged, "Purged tombstones");
        Ok(purged)
    }

    fn query_rows<P: TableRow>(&self, owner: i64, with_tombstones: bool) -> Result<Vec<Record<P>>> {
        let filter = if with_tombstones { "" } else { " AND deleted = 0" };
        let sql = format!(
            "SELECT {} FROM {} WHERE owner = ?1{filter} ORDER BY name",
            select_list::<P>(),
            P::KIND.table(),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([owner], read_record::<P>)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn upsert_rows<P: TableRow>(tx: &Transaction, rows: &[Record<P>]) -> Result<ApplyStats> {
    let table = P::KIND.table();
    let n = P::COLUMNS.len();
    let assignments = P::COLUMNS
        .iter()
        .map(|col| format!("{col} = excluded.{col}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {table} (name, owner, {}, deleted, updated_at)
         VALUES (?1, ?2, {}, ?{}, ?{})
         ON CONFLICT(owner, name) DO UPDATE SET
             {assignments},
             deleted = excluded.deleted,
             updated_at = excluded.updated_at
         WHERE excluded.updated_at >= {table}.updated_at",
        P::COLUMNS.join(", "),
        placeholders(3, n),
        3 + n,
        4 + n,
    );

    let mut stmt = tx.prepare_cached(&sql)?;
    let mut stats = ApplyStats::default();
    for record in rows {
        let mut values: Vec<&dyn ToSql> = vec![&record.name, &record.owner];
        values.extend(record.payload.params());
        values.push(&record.deleted);
        values.push(&record.updated_at);

        if stmt.execute(values.as_slice())? > 0 {
            stats.applied += 1;
        } else {
            stats.skipped += 1;
        }
    }
    Ok(stats)
}
