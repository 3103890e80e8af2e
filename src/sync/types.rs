//! Sync types for the remote exchange.
//!
//! Records travel as JSON with their payload fields flattened next to
//! `name`, `owner`, `deleted` and an RFC 3339 `updated` timestamp:
//! `{"name":"bank","login":"alice","password":"p1","owner":1,"deleted":false,"updated":"2024-01-02T00:04:05Z"}`

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    BinaryPayload, CardPayload, KindCounts, LoginPayload, Payload, Record, Snapshot, TextPayload,
};

/// One record as exchanged with the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRecord<P> {
    pub name: String,
    #[serde(flatten)]
    pub payload: P,
    pub owner: i64,
    #[serde(default)]
    pub deleted: bool,
    /// RFC 3339 instant of the last modification.
    pub updated: String,
}

impl<P: Payload> WireRecord<P> {
    /// Encode a stored record for the wire.
    ///
    /// # Errors
    ///
    /// Returns `SyncFailed` if the timestamp is outside chrono's range.
    pub fn from_record(record: &Record<P>) -> Result<Self> {
        Ok(Self {
            name: record.name.clone(),
            payload: record.payload.clone(),
            owner: record.owner,
            deleted: record.deleted,
            updated: format_timestamp(record.updated_at)?,
        })
    }

    /// Decode into a stored record owned by `owner`.
    ///
    /// The wire `owner` is ignored: rows returned by the remote always
    /// belong to the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `SyncFailed` if `updated` is not a valid RFC 3339 timestamp.
    pub fn into_record(self, owner: i64) -> Result<Record<P>> {
        let updated_at = parse_timestamp(&self.updated).map_err(|e| {
            Error::SyncFailed(format!(
                "{} '{}' has an invalid timestamp '{}': {e}",
                P::KIND,
                self.name,
                self.updated
            ))
        })?;
        Ok(Record {
            name: self.name,
            owner,
            payload: self.payload,
            deleted: self.deleted,
            updated_at,
        })
    }
}

/// Render epoch seconds as `YYYY-MM-DDTHH:MM:SSZ`.
///
/// # Errors
///
/// Returns `SyncFailed` if the value is outside chrono's range.
pub fn format_timestamp(epoch: i64) -> Result<String> {
    DateTime::from_timestamp(epoch, 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .ok_or_else(|| Error::SyncFailed(format!("timestamp out of range: {epoch}")))
}

/// Parse an RFC 3339 timestamp (any offset) into epoch seconds.
///
/// # Errors
///
/// Returns the chrono parse error.
pub fn parse_timestamp(s: &str) -> std::result::Result<i64, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.timestamp())
}

/// Full per-owner record set as sent to, and returned by, the remote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPayload {
    pub logins: Vec<WireRecord<LoginPayload>>,
    pub cards: Vec<WireRecord<CardPayload>>,
    pub texts: Vec<WireRecord<TextPayload>>,
    pub binaries: Vec<WireRecord<BinaryPayload>>,
}

impl SyncPayload {
    /// Encode a local snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SyncFailed` if any timestamp cannot be rendered.
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self> {
        Ok(Self {
            logins: encode(&snapshot.logins)?,
            cards: encode(&snapshot.cards)?,
            texts: encode(&snapshot.texts)?,
            binaries: encode(&snapshot.binaries)?,
        })
    }

    /// Decode into a snapshot owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `SyncFailed` on the first unparseable timestamp.
    pub fn into_snapshot(self, owner: i64) -> Result<Snapshot> {
        Ok(Snapshot {
            logins: decode(self.logins, owner)?,
            cards: decode(self.cards, owner)?,
            texts: decode(self.texts, owner)?,
            binaries: decode(self.binaries, owner)?,
        })
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
}

fn encode<P: Payload>(records: &[Record<P>]) -> Result<Vec<WireRecord<P>>> {
    records.iter().map(WireRecord::from_record).collect()
}

fn decode<P: Payload>(records: Vec<WireRecord<P>>, owner: i64) -> Result<Vec<Record<P>>> {
    records.into_iter().map(|r| r.into_record(owner)).collect()
}

/// Opaque bearer token issued by the remote.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Token(***)")
    }
}

/// Failures reported by a [`RemoteGateway`](super::RemoteGateway).
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The remote has no account for this login.
    #[error("unknown user")]
    UnknownUser,

    /// The remote refused the request (bad credentials, duplicate login).
    #[error("rejected: {0}")]
    Rejected(String),

    /// The token was missing, expired or invalid.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Connection, timeout or other transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote answered with something that is not a valid payload.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Summary of one reconciliation round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// The remote account was created during this round.
    pub registered: bool,
    /// Rows sent, per kind.
    pub sent: KindCounts,
    /// Rows returned by the remote, per kind.
    pub received: KindCounts,
    /// Returned rows written locally.
    pub applied: usize,
    /// Returned rows ignored because the local copy was newer.
    pub skipped: usize,
    /// Tombstones removed after the exchange.
    pub purged: usize,
    /// Tombstone purge failed; tombstones remain and will be resent.
    pub purge_failed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> Record<LoginPayload> {
        Record::new(
            "bank",
            1,
            LoginPayload {
                login: "alice".into(),
                secret: "p1".into(),
            },
        )
        .at(1_704_153_845)
    }

    #[test]
    fn test_wire_json_shape() {
        let wire = WireRecord::from_record(&bank()).unwrap();
        let json = serde_json::to_value(&wire).unwrap();

        assert_eq!(json["name"], "bank");
        assert_eq!(json["login"], "alice");
        assert_eq!(json["password"], "p1");
        assert_eq!(json["owner"], 1);
        assert_eq!(json["deleted"], false);
        assert_eq!(json["updated"], "2024-01-02T00:04:05Z");
    }

    #[test]
    fn test_offset_timestamps_are_normalized() {
        assert_eq!(
            parse_timestamp("2024-01-02T03:04:05+03:00").unwrap(),
            1_704_153_845
        );
    }

    #[test]
    fn test_into_snapshot_takes_session_owner() {
        let json = r#"{
            "texts": [{"name":"n","data":"hi","owner":99,"deleted":true,"updated":"1970-01-01T00:01:40Z"}]
        }"#;
        let payload: SyncPayload = serde_json::from_str(json).unwrap();
        let snapshot = payload.into_snapshot(7).unwrap();

        assert!(snapshot.logins.is_empty());
        let text = &snapshot.texts[0];
        assert_eq!(text.owner, 7);
        assert_eq!(text.updated_at, 100);
        assert!(text.deleted);
    }

    #[test]
    fn test_bad_timestamp_fails_exchange() {
        let payload = SyncPayload {
            logins: vec![WireRecord {
                name: "bank".into(),
                payload: LoginPayload {
                    login: "a".into(),
                    secret: "b".into(),
                },
                owner: 1,
                deleted: false,
                updated: "yesterday".into(),
            }],
            ..SyncPayload::default()
        };
        let err = payload.into_snapshot(1).unwrap_err();
        assert!(matches!(err, Error::SyncFailed(msg) if msg.contains("bank")));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        assert_eq!(format!("{:?}", Token::new("secret")), "Token(***)");
    }
}
