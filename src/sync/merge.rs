//! Last-write-wins conflict resolution.
//!
//! The remote's copy is the stored side at both ends of a round. The remote
//! folds each uploaded row into its own rows with [`merge`]. The client then
//! applies the returned rows unless its own row is strictly newer, which is
//! `merge(Some(returned), local)` with the roles swapped; the `apply_merged`
//! upsert guard (`excluded.updated_at >= updated_at`) encodes the same rule.

use std::collections::BTreeMap;

use crate::model::{Payload, Record};

/// Which side of a conflict survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    /// The row already held.
    Stored,
    /// The row being offered.
    Incoming,
}

/// Decide between the stored row (if any) and an incoming row.
///
/// The incoming row wins only when it is strictly newer, or when nothing is
/// stored under its name. Equal timestamps keep the stored row.
#[must_use]
pub fn merge<P: Payload>(stored: Option<&Record<P>>, incoming: &Record<P>) -> Winner {
    match stored {
        None => Winner::Incoming,
        Some(stored) if incoming.updated_at > stored.updated_at => Winner::Incoming,
        Some(_) => Winner::Stored,
    }
}

/// Fold `incoming` into `rows` (keyed by name) with [`merge`].
///
/// Returns the number of rows replaced or inserted.
pub fn merge_rows<P: Payload>(
    rows: &mut BTreeMap<String, Record<P>>,
    incoming: impl IntoIterator<Item = Record<P>>,
) -> usize {
    let mut changed = 0;
    for record in incoming {
        if merge(rows.get(&record.name), &record) == Winner::Incoming {
            rows.insert(record.name.clone(), record);
            changed += 1;
        }
    }
    changed
}
