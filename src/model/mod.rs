//! Data models for Keeper.
//!
//! This module contains all domain models:
//! - Record (login, card, text, binary payloads)
//! - Snapshot
//! - User
//! - Session

pub mod record;
pub mod snapshot;
pub mod user;

pub use record::{
    BinaryPayload, BinaryRecord, CardPayload, CardRecord, LoginPayload, LoginRecord, Payload,
    Record, RecordKind, TextPayload, TextRecord,
};
pub use snapshot::{KindCounts, Snapshot};
pub use user::{Session, User};
