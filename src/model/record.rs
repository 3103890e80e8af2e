//! Vault records.
//!
//! Every record kind shares one shape: a user-chosen `name`, the owning
//! user's id, a kind-specific payload, a tombstone flag and the instant of
//! the last modification. [`Record`] is generic over the payload; the four
//! payload types below pin down what each kind protects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four kinds of record a vault holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Login + secret pair.
    Login,
    /// Payment card.
    Card,
    /// Free-form text note.
    Text,
    /// Raw bytes.
    Binary,
}

impl RecordKind {
    /// All kinds, in sync payload order.
    pub const ALL: [Self; 4] = [Self::Login, Self::Card, Self::Text, Self::Binary];

    /// Singular label used in messages and on the command line.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Card => "card",
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }

    /// Backing table name.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Login => "logins",
            Self::Card => "cards",
            Self::Text => "texts",
            Self::Binary => "binaries",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "login" | "logins" | "auth" => Ok(Self::Login),
            "card" | "cards" => Ok(Self::Card),
            "text" | "texts" | "note" => Ok(Self::Text),
            "binary" | "binaries" | "bin" => Ok(Self::Binary),
            _ => Err(format!(
                "Unknown record kind: {s} (expected login, card, text or binary)"
            )),
        }
    }
}

/// Kind-specific protected content.
pub trait Payload: Clone + fmt::Debug + PartialEq {
    /// The record kind this payload belongs to.
    const KIND: RecordKind;
}

/// A stored login credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginPayload {
    pub login: String,
    #[serde(rename = "password")]
    pub secret: String,
}

/// A stored payment card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPayload {
    pub number: String,
    /// Expiry as printed on the card (e.g. `12/27`).
    #[serde(rename = "date")]
    pub expiry: String,
    /// Kept as text so leading zeros survive.
    pub cvv: String,
}

/// A stored text note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPayload {
    #[serde(rename = "data")]
    pub text: String,
}

/// A stored binary blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryPayload {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl Payload for LoginPayload {
    const KIND: RecordKind = RecordKind::Login;
}

impl Payload for CardPayload {
    const KIND: RecordKind = RecordKind::Card;
}

impl Payload for TextPayload {
    const KIND: RecordKind = RecordKind::Text;
}

impl Payload for BinaryPayload {
    const KIND: RecordKind = RecordKind::Binary;
}

/// One stored item of a given kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record<P> {
    /// Unique per (owner, kind).
    pub name: String,

    /// Owning user id.
    pub owner: i64,

    #[serde(flatten)]
    pub payload: P,

    /// Tombstone flag.
    pub deleted: bool,

    /// Last modification (Unix seconds).
    pub updated_at: i64,
}

impl<P: Payload> Record<P> {
    /// A live record with no timestamp yet; the store stamps it on save.
    pub fn new(name: impl Into<String>, owner: i64, payload: P) -> Self {
        Self {
            name: name.into(),
            owner,
            payload,
            deleted: false,
            updated_at: 0,
        }
    }

    /// Builder-style timestamp override.
    #[must_use]
    pub fn at(mut self, updated_at: i64) -> Self {
        self.updated_at = updated_at;
        self
    }

    /// Builder-style tombstone flag.
    #[must_use]
    pub fn tombstoned(mut self) -> Self {
        self.deleted = true;
        self
    }

    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        P::KIND
    }

    #[must_use]
    pub const fn is_tombstone(&self) -> bool {
        self.deleted
    }
}

pub type LoginRecord = Record<LoginPayload>;
pub type CardRecord = Record<CardPayload>;
pub type TextRecord = Record<TextPayload>;
pub type BinaryRecord = Record<BinaryPayload>;

/// Serde adapter: bytes as standard base64 text.
mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
