//! In-process remote.
//!
//! Keeps every account's vault in memory and applies the same
//! last-write-wins rule a real server does. Useful for tests and for
//! offline dry runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::gateway::RemoteGateway;
use super::merge::merge_rows;
use super::types::{GatewayError, SyncPayload, Token, WireRecord};
use crate::model::{
    BinaryPayload, CardPayload, LoginPayload, Payload, Record, Snapshot, TextPayload,
};

#[derive(Debug, Default)]
struct Vault {
    logins: BTreeMap<String, Record<LoginPayload>>,
    cards: BTreeMap<String, Record<CardPayload>>,
    texts: BTreeMap<String, Record<TextPayload>>,
    binaries: BTreeMap<String, Record<BinaryPayload>>,
}

impl Vault {
    fn absorb(&mut self, snapshot: Snapshot) -> usize {
        merge_rows(&mut self.logins, snapshot.logins)
            + merge_rows(&mut self.cards, snapshot.cards)
            + merge_rows(&mut self.texts, snapshot.texts)
            + merge_rows(&mut self.binaries, snapshot.binaries)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            logins: self.logins.values().cloned().collect(),
            cards: self.cards.values().cloned().collect(),
            texts: self.texts.values().cloned().collect(),
            binaries: self.binaries.values().cloned().collect(),
        }
    }
}

#[derive(Debug)]
struct Account {
    verifier: String,
    remote_id: i64,
    token: Option<String>,
    vault: Vault,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<String, Account>,
    next_id: i64,
    issued: u64,
    offline: bool,
}

impl State {
    fn issue(&mut self, login: &str) -> Token {
        self.issued += 1;
        let token = format!("mem-{login}-{}", self.issued);
        if let Some(account) = self.accounts.get_mut(login) {
            account.token = Some(token.clone());
        }
        Token::new(token)
    }

    fn check_online(&self) -> Result<(), GatewayError> {
        if self.offline {
            Err(GatewayError::Transport("remote is offline".into()))
        } else {
            Ok(())
        }
    }
}

/// A remote held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    state: Mutex<State>,
}

impl MemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every call fail with a transport error until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Create `login` if needed and merge `snapshot` into its vault.
    pub fn seed(&self, login: &str, verifier: &str, snapshot: Snapshot) {
        let mut state = self.state();
        if !state.accounts.contains_key(login) {
            state.next_id += 1;
            let remote_id = state.next_id;
            state.accounts.insert(
                login.to_string(),
                Account {
                    verifier: verifier.to_string(),
                    remote_id,
                    token: None,
                    vault: Vault::default(),
                },
            );
        }
        if let Some(account) = state.accounts.get_mut(login) {
            account.vault.absorb(snapshot);
        }
    }

    /// The remote's current record set for `login`, if the account exists.
    #[must_use]
    pub fn snapshot(&self, login: &str) -> Option<Snapshot> {
        self.state().accounts.get(login).map(|a| a.vault.snapshot())
    }

    /// Whether an account exists for `login`.
    #[must_use]
    pub fn has_account(&self, login: &str) -> bool {
        self.state().accounts.contains_key(login)
    }
}

impl RemoteGateway for MemoryRemote {
    fn authenticate(&self, login: &str, verifier: &str) -> Result<Token, GatewayError> {
        let mut state = self.state();
        state.check_online()?;
        let verified = match state.accounts.get(login) {
            None => return Err(GatewayError::UnknownUser),
            Some(account) => account.verifier == verifier,
        };
        if !verified {
            return Err(GatewayError::Rejected("invalid credentials".into()));
        }
        Ok(state.issue(login))
    }

    fn register(&self, login: &str, verifier: &str) -> Result<Token, GatewayError> {
        let mut state = self.state();
        state.check_online()?;
        if state.accounts.contains_key(login) {
            return Err(GatewayError::Rejected(format!("login '{login}' is taken")));
        }

        state.next_id += 1;
        let remote_id = state.next_id;
        state.accounts.insert(
            login.to_string(),
            Account {
                verifier: verifier.to_string(),
                remote_id,
                token: None,
                vault: Vault::default(),
            },
        );
        Ok(state.issue(login))
    }

    fn sync(&self, token: &Token, payload: &SyncPayload) -> Result<SyncPayload, GatewayError> {
        let mut state = self.state();
        state.check_online()?;

        let account = state
            .accounts
            .values_mut()
            .find(|a| a.token.as_deref() == Some(token.as_str()))
            .ok_or_else(|| GatewayError::Unauthorized("unknown token".into()))?;

        let incoming = Snapshot {
            logins: decode(&payload.logins, account.remote_id)?,
            cards: decode(&payload.cards, account.remote_id)?,
            texts: decode(&payload.texts, account.remote_id)?,
            binaries: decode(&payload.binaries, account.remote_id)?,
        };
        account.vault.absorb(incoming);

        SyncPayload::from_snapshot(&account.vault.snapshot())
            .map_err(|e| GatewayError::Protocol(e.to_string()))
    }
}

fn decode<P: Payload>(rows: &[WireRecord<P>], owner: i64) -> Result<Vec<Record<P>>, GatewayError> {
    rows.iter()
        .cloned()
        .map(|r| {
            r.into_record(owner)
                .map_err(|e| GatewayError::Protocol(e.to_string()))
        })
        .collect()
}
