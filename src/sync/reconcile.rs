//! One reconciliation round between the local store and a remote.
//!
//! 1. Authenticate (registering the remote account on first contact)
//! 2. Collect the owner's full local snapshot, tombstones included
//! 3. Exchange it for the remote's merged snapshot
//! 4. Apply the returned rows locally, keeping newer local rows
//! 5. Purge local tombstones
//!
//! Nothing is written locally before step 3 succeeds, and step 4 is a
//! single transaction. No lock is held across the round: a local write that
//! lands between steps 2 and 4 may be lost, and a delete made in that window
//! is purged without ever reaching the remote.

use tracing::{debug, info, warn};

use super::gateway::RemoteGateway;
use super::types::{GatewayError, SyncPayload, SyncReport, Token};
use crate::error::{Error, Result};
use crate::model::{Session, Snapshot};
use crate::storage::{ApplyStats, SqliteStorage};

/// The local side of a reconciliation round.
pub trait SyncStore {
    /// Every row of every kind for `owner`, tombstones included.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn snapshot(&self, owner: i64) -> Result<Snapshot>;

    /// Upsert the returned rows atomically, keeping newer local rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows cannot be written; nothing is applied.
    fn apply_merged(&mut self, snapshot: &Snapshot) -> Result<ApplyStats>;

    /// Physically remove `owner`'s tombstones.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows cannot be removed.
    fn purge_deleted(&mut self, owner: i64) -> Result<usize>;
}

impl SyncStore for SqliteStorage {
    fn snapshot(&self, owner: i64) -> Result<Snapshot> {
        SqliteStorage::snapshot(self, owner)
    }

    fn apply_merged(&mut self, snapshot: &Snapshot) -> Result<ApplyStats> {
        SqliteStorage::apply_merged(self, snapshot)
    }

    fn purge_deleted(&mut self, owner: i64) -> Result<usize> {
        SqliteStorage::purge_deleted(self, owner)
    }
}

/// Runs reconciliation rounds for one session.
pub struct Reconciler<'a, S: SyncStore, G: RemoteGateway> {
    store: &'a mut S,
    gateway: &'a G,
    session: &'a Session,
}

impl<'a, S: SyncStore, G: RemoteGateway> Reconciler<'a, S, G> {
    /// Create a reconciler over explicit dependencies.
    pub fn new(store: &'a mut S, gateway: &'a G, session: &'a Session) -> Self {
        Self {
            store,
            gateway,
            session,
        }
    }

    /// Run one complete round.
    ///
    /// # Errors
    ///
    /// Returns `RemoteAuthFailed` if the remote refuses the session,
    /// `SyncFailed` if the exchange fails or returns invalid data, or a
    /// storage error from collecting or applying. In every error case the
    /// local store is unchanged.
    pub fn run(&mut self) -> Result<SyncReport> {
        let owner = self.session.user_id;
        let mut report = SyncReport::default();

        let (token, registered) = self.authenticate()?;
        report.registered = registered;

        let local = self.store.snapshot(owner)?;
        let outgoing = SyncPayload::from_snapshot(&local)?;
        report.sent = outgoing.counts();
        debug!(
            owner,
            rows = local.len(),
            tombstones = local.tombstones(),
            "Collected local snapshot"
        );

        let returned = self
            .gateway
            .sync(&token, &outgoing)
            .map_err(|e| Error::SyncFailed(e.to_string()))?;
        report.received = returned.counts();

        let merged = returned.into_snapshot(owner)?;
        let stats = self.store.apply_merged(&merged)?;
        report.applied = stats.applied;
        report.skipped = stats.skipped;

        match self.store.purge_deleted(owner) {
            Ok(purged) => report.purged = purged,
            Err(e) => {
                warn!(owner, error = %e, "Tombstone purge failed; tombstones will be resent");
                report.purge_failed = true;
            }
        }

        info!(
            owner,
            sent = report.sent.total(),
            received = report.received.total(),
            applied = report.applied,
            skipped = report.skipped,
            purged = report.purged,
            "Sync complete"
        );
        Ok(report)
    }

    fn authenticate(&self) -> Result<(Token, bool)> {
        let Session {
            login, verifier, ..
        } = self.session;

        match self.gateway.authenticate(login, verifier) {
            Ok(token) => Ok((token, false)),
            Err(GatewayError::UnknownUser) => {
                info!(login = %login, "Remote account not found; registering");
                self.gateway
                    .register(login, verifier)
                    .map_err(remote_auth_failed)?;
                let token = self
                    .gateway
                    .authenticate(login, verifier)
                    .map_err(remote_auth_failed)?;
                Ok((token, true))
            }
            Err(e) => Err(remote_auth_failed(e)),
        }
    }
}

fn remote_auth_failed(err: GatewayError) -> Error {
    Error::RemoteAuthFailed(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verifier;
    use crate::model::{LoginPayload, Record, RecordKind, TextPayload};
    use crate::sync::memory::MemoryRemote;
    use std::cell::Cell;
    use std::path::PathBuf;

    fn session() -> Session {
        Session {
            user_id: 1,
            login: "alice".into(),
            verifier: verifier("alice", "pw"),
        }
    }

    fn bank(secret: &str) -> Record<LoginPayload> {
        Record::new(
            "bank",
            1,
            LoginPayload {
                login: "alice".into(),
                secret: secret.into(),
            },
        )
    }

    fn remote_with(snapshot: Snapshot) -> MemoryRemote {
        let remote = MemoryRemote::new();
        remote.seed("alice", &session().verifier, snapshot);
        remote
    }

    fn sync(storage: &mut SqliteStorage, remote: &impl RemoteGateway) -> Result<SyncReport> {
        let session = session();
        Reconciler::new(storage, remote, &session).run()
    }

    #[test]
    fn test_newer_remote_replaces_local() {
        let mut storage = SqliteStorage::open_memory().unwrap().with_clock(|| 10);
        storage.save(&bank("local")).unwrap();
        let remote = remote_with(Snapshot {
            logins: vec![bank("remote").at(20)],
            ..Snapshot::default()
        });

        sync(&mut storage, &remote).unwrap();

        let got: Record<LoginPayload> = storage.get_by_name(1, "bank").unwrap();
        assert_eq!(got.payload.secret, "remote");
        assert_eq!(got.updated_at, 20);
    }

    #[test]
    fn test_newer_local_replaces_remote() {
        let mut storage = SqliteStorage::open_memory().unwrap().with_clock(|| 20);
        storage.save(&bank("local")).unwrap();
        let remote = remote_with(Snapshot {
            logins: vec![bank("remote").at(10)],
            ..Snapshot::default()
        });

        let report = sync(&mut storage, &remote).unwrap();

        let remote_bank = &remote.snapshot("alice").unwrap().logins[0];
        assert_eq!(remote_bank.payload.secret, "local");
        assert_eq!(remote_bank.updated_at, 20);
        let got: Record<LoginPayload> = storage.get_by_name(1, "bank").unwrap();
        assert_eq!(got.payload.secret, "local");
        assert_eq!(report.sent.logins, 1);
        assert_eq!(report.received.logins, 1);
    }

    #[test]
    fn test_bank_scenario() {
        let mut storage = SqliteStorage::open_memory().unwrap().with_clock(|| 100);
        storage.save(&bank("p1")).unwrap();
        let remote = remote_with(Snapshot::default());

        sync(&mut storage, &remote).unwrap();

        let expected = bank("p1").at(100);
        assert_eq!(remote.snapshot("alice").unwrap().logins[0].payload, expected.payload);
        assert_eq!(remote.snapshot("alice").unwrap().logins[0].updated_at, 100);
        assert_eq!(storage.get_by_name::<LoginPayload>(1, "bank").unwrap(), expected);
    }

    #[test]
    fn test_second_round_is_a_no_op() {
        let mut storage = SqliteStorage::open_memory().unwrap().with_clock(|| 5);
        storage.save(&bank("p1")).unwrap();
        storage
            .save(&Record::new("note", 1, TextPayload { text: "t".into() }))
            .unwrap();
        let remote = remote_with(Snapshot {
            texts: vec![Record::new("todo", 1, TextPayload { text: "r".into() }).at(3)],
            ..Snapshot::default()
        });

        sync(&mut storage, &remote).unwrap();
        let local_after_first = storage.snapshot(1).unwrap();
        let remote_after_first = remote.snapshot("alice").unwrap();

        sync(&mut storage, &remote).unwrap();
        assert_eq!(storage.snapshot(1).unwrap(), local_after_first);
        assert_eq!(remote.snapshot("alice").unwrap(), remote_after_first);
    }

    #[test]
    fn test_delete_propagates_and_purges() {
        let mut storage = SqliteStorage::open_memory().unwrap().with_clock(|| 10);
        storage.save(&bank("p1")).unwrap();
        let remote = remote_with(Snapshot::default());
        sync(&mut storage, &remote).unwrap();

        storage = storage.with_clock(|| 11);
        storage.delete(RecordKind::Login, 1, "bank").unwrap();
        let report = sync(&mut storage, &remote).unwrap();

        assert_eq!(report.purged, 1);
        assert!(storage.snapshot(1).unwrap().is_empty());
        let remote_bank = &remote.snapshot("alice").unwrap().logins[0];
        assert!(remote_bank.deleted);
        assert_eq!(remote_bank.updated_at, 11);
    }

    #[test]
    fn test_unknown_user_is_registered_then_authenticated() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let remote = MemoryRemote::new();

        let report = sync(&mut storage, &remote).unwrap();
        assert!(report.registered);
        assert!(remote.has_account("alice"));

        let report = sync(&mut storage, &remote).unwrap();
        assert!(!report.registered);
    }

    #[test]
    fn test_rejected_credentials_fail_round() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.save(&bank("p1")).unwrap();
        let remote = MemoryRemote::new();
        remote.seed("alice", "some-other-verifier", Snapshot::default());

        let err = sync(&mut storage, &remote).unwrap_err();
        assert!(matches!(err, Error::RemoteAuthFailed(_)));
        assert!(remote.snapshot("alice").unwrap().is_empty());
    }

    /// Authenticates through a [`MemoryRemote`] but fails or corrupts the exchange.
    struct BrokenExchange {
        inner: MemoryRemote,
        bad_timestamp: bool,
    }

    impl RemoteGateway for BrokenExchange {
        fn authenticate(&self, login: &str, verifier: &str) -> std::result::Result<Token, GatewayError> {
            self.inner.authenticate(login, verifier)
        }

        fn register(&self, login: &str, verifier: &str) -> std::result::Result<Token, GatewayError> {
            self.inner.register(login, verifier)
        }

        fn sync(
            &self,
            token: &Token,
            payload: &SyncPayload,
        ) -> std::result::Result<SyncPayload, GatewayError> {
            if !self.bad_timestamp {
                return Err(GatewayError::Transport("connection reset".into()));
            }
            let mut returned = self.inner.sync(token, payload)?;
            for row in &mut returned.logins {
                row.updated = "not-a-time".into();
            }
            Ok(returned)
        }
    }

    #[test]
    fn test_failed_exchange_leaves_local_unchanged() {
        for bad_timestamp in [false, true] {
            let mut storage = SqliteStorage::open_memory().unwrap().with_clock(|| 10);
            storage.save(&bank("p1")).unwrap();
            storage
                .save(&Record::new("note", 1, TextPayload { text: "t".into() }))
                .unwrap();
            storage.delete(RecordKind::Text, 1, "note").unwrap();
            let before = storage.snapshot(1).unwrap();

            let gateway = BrokenExchange {
                inner: remote_with(Snapshot {
                    logins: vec![bank("remote").at(50)],
                    ..Snapshot::default()
                }),
                bad_timestamp,
            };
            let err = sync(&mut storage, &gateway).unwrap_err();

            assert!(matches!(err, Error::SyncFailed(_)), "got {err:?}");
            assert_eq!(storage.snapshot(1).unwrap(), before);
        }
    }

    /// Store whose purge always fails.
    struct NoPurge<'a>(&'a mut SqliteStorage);

    impl SyncStore for NoPurge<'_> {
        fn snapshot(&self, owner: i64) -> Result<Snapshot> {
            self.0.snapshot(owner)
        }

        fn apply_merged(&mut self, snapshot: &Snapshot) -> Result<ApplyStats> {
            self.0.apply_merged(snapshot)
        }

        fn purge_deleted(&mut self, _owner: i64) -> Result<usize> {
            Err(Error::Io(std::io::Error::other("disk full")))
        }
    }

    #[test]
    fn test_purge_failure_does_not_fail_round() {
        let mut storage = SqliteStorage::open_memory().unwrap().with_clock(|| 10);
        storage.save(&bank("p1")).unwrap();
        storage.delete(RecordKind::Login, 1, "bank").unwrap();
        let remote = remote_with(Snapshot::default());
        let session = session();

        let mut store = NoPurge(&mut storage);
        let report = Reconciler::new(&mut store, &remote, &session).run().unwrap();

        assert!(report.purge_failed);
        assert_eq!(report.purged, 0);
        assert_eq!(storage.snapshot(1).unwrap().tombstones(), 1);
        assert!(remote.snapshot("alice").unwrap().logins[0].deleted);
    }

    /// Deletes `bank` through a second connection while the exchange is in flight.
    struct DeleteDuringExchange {
        inner: MemoryRemote,
        db_path: PathBuf,
        armed: Cell<bool>,
    }

    impl RemoteGateway for DeleteDuringExchange {
        fn authenticate(&self, login: &str, verifier: &str) -> std::result::Result<Token, GatewayError> {
            self.inner.authenticate(login, verifier)
        }

        fn register(&self, login: &str, verifier: &str) -> std::result::Result<Token, GatewayError> {
            self.inner.register(login, verifier)
        }

        fn sync(
            &self,
            token: &Token,
            payload: &SyncPayload,
        ) -> std::result::Result<SyncPayload, GatewayError> {
            if self.armed.replace(false) {
                let mut other = SqliteStorage::open(&self.db_path).unwrap().with_clock(|| 200);
                assert!(other.delete(RecordKind::Login, 1, "bank").unwrap());
            }
            self.inner.sync(token, payload)
        }
    }

    #[test]
    fn test_delete_between_collect_and_apply_is_resurrected() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("vault.db");
        let mut storage = SqliteStorage::open(&db_path).unwrap().with_clock(|| 100);
        storage.save(&bank("p1")).unwrap();

        let gateway = DeleteDuringExchange {
            inner: remote_with(Snapshot::default()),
            db_path: db_path.clone(),
            armed: Cell::new(false),
        };

        // Round 1: both sides hold bank
        sync(&mut storage, &gateway).unwrap();

        // Round 2: the delete lands after Collect; its tombstone is newer than
        // the returned row, survives Apply, then is purged without being sent
        gateway.armed.set(true);
        sync(&mut storage, &gateway).unwrap();
        assert!(storage.snapshot(1).unwrap().is_empty());
        assert!(!gateway.inner.snapshot("alice").unwrap().logins[0].deleted);

        // Round 3: the remote's live copy comes back
        sync(&mut storage, &gateway).unwrap();
        let resurrected: Record<LoginPayload> = storage.get_by_name(1, "bank").unwrap();
        assert_eq!(resurrected.payload.secret, "p1");
        assert_eq!(resurrected.updated_at, 100);
    }
}
