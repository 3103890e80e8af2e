//! CLI definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::model::RecordKind;

/// Output format for commands.
#[derive(ValueEnum, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Table,
    /// JSON (same as --json)
    Json,
}

pub mod commands;

/// Keeper - a personal secrets vault with remote sync
#[derive(Parser, Debug)]
#[command(name = "keeper", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.keeper/keeper.db)
    #[arg(long, global = true, env = "KEEPER_DB")]
    pub db: Option<PathBuf>,

    /// Session file path (default: ~/.keeper/session)
    #[arg(long, global = true, env = "KEEPER_SESSION")]
    pub session_file: Option<PathBuf>,

    /// Remote server address (default: http://localhost:8080)
    #[arg(long, global = true, env = "KEEPER_SERVER")]
    pub server: Option<String>,

    /// Remote request timeout in seconds (default: 30)
    #[arg(long, global = true, env = "KEEPER_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Output format (table, json)
    #[arg(long, value_enum, global = true, default_value_t)]
    pub format: OutputFormat,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a local account and sign in
    Register {
        /// Account login
        login: String,
        /// Account password
        password: String,
    },

    /// Sign in to an existing local account
    Login {
        /// Account login
        login: String,
        /// Account password
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in account
    Whoami,

    /// Save a new record
    Save {
        #[command(subcommand)]
        record: RecordInput,
    },

    /// Overwrite an existing record
    Update {
        #[command(subcommand)]
        record: RecordInput,
    },

    /// Show one record
    Get {
        /// Record kind (login, card, text, binary)
        kind: RecordKind,
        /// Record name
        name: String,
        /// Where to write binary data (default: <name>.bin)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// List records of one kind
    List {
        /// Record kind (login, card, text, binary)
        kind: RecordKind,
    },

    /// Delete a record
    Delete {
        /// Record kind (login, card, text, binary)
        kind: RecordKind,
        /// Record name
        name: String,
    },

    /// Reconcile the local vault with the remote server
    Sync,

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Record content for `save` and `update`.
#[derive(Subcommand, Debug, Clone)]
pub enum RecordInput {
    /// Login and password pair
    Login {
        /// Record name
        name: String,
        /// Stored login
        login: String,
        /// Stored password
        password: String,
    },

    /// Payment card
    Card {
        /// Record name
        name: String,
        /// Card number
        number: String,
        /// Expiry as printed (e.g. 12/27)
        expiry: String,
        /// Security code
        cvv: String,
    },

    /// Text note
    Text {
        /// Record name
        name: String,
        /// Note content
        text: String,
    },

    /// Binary file
    Binary {
        /// Record name
        name: String,
        /// File to read
        #[arg(long)]
        file: PathBuf,
    },
}

impl RecordInput {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Login { name, .. }
            | Self::Card { name, .. }
            | Self::Text { name, .. }
            | Self::Binary { name, .. } => name,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Login { .. } => RecordKind::Login,
            Self::Card { .. } => RecordKind::Card,
            Self::Text { .. } => RecordKind::Text,
            Self::Binary { .. } => RecordKind::Binary,
        }
    }
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}
