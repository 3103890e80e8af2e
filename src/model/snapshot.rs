//! Full per-owner record sets exchanged during reconciliation.

use serde::Serialize;

use super::record::{BinaryRecord, CardRecord, LoginRecord, RecordKind, TextRecord};

/// Every row of every kind for one owner, tombstones included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub logins: Vec<LoginRecord>,
    pub cards: Vec<CardRecord>,
    pub texts: Vec<TextRecord>,
    pub binaries: Vec<BinaryRecord>,
}

impl Snapshot {
    /// Total number of rows across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts().total()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row counts per kind.
    #[must_use]
    pub fn counts(&self) -> KindCounts {
        KindCounts {
            logins: self.logins.len(),
            cards: self.cards.len(),
            texts: self.texts.len(),
            binaries: self.binaries.len(),
        }
    }

    /// Number of tombstones across all kinds.
    #[must_use]
    pub fn tombstones(&self) -> usize {
        self.logins.iter().filter(|r| r.deleted).count()
            + self.cards.iter().filter(|r| r.deleted).count()
            + self.texts.iter().filter(|r| r.deleted).count()
            + self.binaries.iter().filter(|r| r.deleted).count()
    }

    /// Names present for `kind`, in snapshot order.
    #[must_use]
    pub fn names(&self, kind: RecordKind) -> Vec<&str> {
        match kind {
            RecordKind::Login => self.logins.iter().map(|r| r.name.as_str()).collect(),
            RecordKind::Card => self.cards.iter().map(|r| r.name.as_str()).collect(),
            RecordKind::Text => self.texts.iter().map(|r| r.name.as_str()).collect(),
            RecordKind::Binary => self.binaries.iter().map(|r| r.name.as_str()).collect(),
        }
    }
}

/// Per-kind row counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub logins: usize,
    pub cards: usize,
    pub texts: usize,
    pub binaries: usize,
}

impl KindCounts {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.logins + self.cards + self.texts + self.binaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LoginPayload, Record, TextPayload};

    #[test]
    fn test_counts_and_tombstones() {
        let snapshot = Snapshot {
            logins: vec![
                Record::new(
                    "a",
                    1,
                    LoginPayload {
                        login: "u".into(),
                        secret: "s".into(),
                    },
                ),
                Record::new(
                    "b",
                    1,
                    LoginPayload {
                        login: "u".into(),
                        secret: "s".into(),
                    },
                )
                .tombstoned(),
            ],
            texts: vec![Record::new("n", 1, TextPayload { text: "x".into() })],
            ..Snapshot::default()
        };

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.counts().logins, 2);
        assert_eq!(snapshot.tombstones(), 1);
        assert_eq!(snapshot.names(RecordKind::Login), vec!["a", "b"]);
        assert!(Snapshot::default().is_empty());
    }
}
