//! Column mapping between payload types and their backing tables.

use rusqlite::types::ToSql;
use rusqlite::Row;

use crate::model::{BinaryPayload, CardPayload, LoginPayload, Payload, Record, TextPayload};

/// A payload that can be stored in, and read back from, its kind's table.
///
/// Every table stores `name, owner, <payload columns>, deleted, updated_at`;
/// implementors describe only the payload columns.
pub trait TableRow: Payload {
    /// Payload column names, in binding order.
    const COLUMNS: &'static [&'static str];

    /// Values for [`Self::COLUMNS`], in the same order.
    fn params(&self) -> Vec<&dyn ToSql>;

    /// Read the payload starting at column `offset`.
    fn read(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self>;
}

impl TableRow for LoginPayload {
    const COLUMNS: &'static [&'static str] = &["login", "secret"];

    fn params(&self) -> Vec<&dyn ToSql> {
        vec![&self.login, &self.secret]
    }

    fn read(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            login: row.get(offset)?,
            secret: row.get(offset + 1)?,
        })
    }
}

impl TableRow for CardPayload {
    const COLUMNS: &'static [&'static str] = &["number", "expiry", "cvv"];

    fn params(&self) -> Vec<&dyn ToSql> {
        vec![&self.number, &self.expiry, &self.cvv]
    }

    fn read(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            number: row.get(offset)?,
            expiry: row.get(offset + 1)?,
            cvv: row.get(offset + 2)?,
        })
    }
}

impl TableRow for TextPayload {
    const COLUMNS: &'static [&'static str] = &["body"];

    fn params(&self) -> Vec<&dyn ToSql> {
        vec![&self.text]
    }

    fn read(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            text: row.get(offset)?,
        })
    }
}

impl TableRow for BinaryPayload {
    const COLUMNS: &'static [&'static str] = &["data"];

    fn params(&self) -> Vec<&dyn ToSql> {
        vec![&self.data]
    }

    fn read(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            data: row.get(offset)?,
        })
    }
}

/// `name, owner, <payload columns>, deleted, updated_at`
pub(crate) fn select_list<P: TableRow>() -> String {
    format!("name, owner, {}, deleted, updated_at", P::COLUMNS.join(", "))
}

/// Map a row selected with [`select_list`] into a record.
pub(crate) fn read_record<P: TableRow>(row: &Row<'_>) -> rusqlite::Result<Record<P>> {
    let n = P::COLUMNS.len();
    Ok(Record {
        name: row.get(0)?,
        owner: row.get(1)?,
        payload: P::read(row, 2)?,
        deleted: row.get(2 + n)?,
        updated_at: row.get(3 + n)?,
    })
}

/// `?start, ?start+1, ...` for `count` parameters.
pub(crate) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
