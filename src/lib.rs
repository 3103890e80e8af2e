//! Keeper - a personal secrets vault with remote sync
//!
//! This crate provides the core functionality for the `keeper` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (Record, Snapshot, User, Session)
//! - [`storage`] - SQLite record store
//! - [`sync`] - Remote gateway and last-write-wins reconciliation
//! - [`auth`] - Local accounts and password checks
//! - [`envelope`] - Encrypted session file
//! - [`session`] - Signed-in session resolution
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod cli;
pub mod config;
pub mod envelope;
pub mod error;
pub mod file;
pub mod model;
pub mod session;
pub mod storage;
pub mod sync;
pub mod validate;

pub use error::{Error, Result};
