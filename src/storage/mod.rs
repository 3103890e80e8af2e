//! SQLite storage layer for Keeper.
//!
//! This module provides the local record store using SQLite with:
//! - WAL mode for file databases
//! - Transaction discipline for atomic writes
//! - Tombstones kept until a completed sync round purges them
//!
//! # Submodules
//!
//! - [`migrations`] - Versioned schema migrations
//! - [`rows`] - Payload to column mapping
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod migrations;
pub mod rows;
pub mod schema;
pub mod sqlite;

pub use rows::TableRow;
pub use sqlite::{ApplyStats, SqliteStorage};
