//! Record command implementations (save, update, get, list, delete).

use super::{format_time, open_storage, session_path};
use crate::cli::RecordInput;
use crate::error::{Error, Result};
use crate::file::atomic_write;
use crate::model::{
    BinaryPayload, CardPayload, LoginPayload, Record, RecordKind, Session, TextPayload,
};
use crate::session;
use crate::storage::{SqliteStorage, TableRow};
use crate::validate::{card_payload, find_similar_names, validate_name};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Output for save.
#[derive(Serialize)]
struct SaveOutput<'a> {
    kind: RecordKind,
    name: &'a str,
    id: i64,
}

/// Output for update.
#[derive(Serialize)]
struct UpdateOutput<'a> {
    kind: RecordKind,
    name: &'a str,
    updated: bool,
    /// The matched row is a tombstone and stays hidden.
    deleted: bool,
}

/// Output for delete.
#[derive(Serialize)]
struct DeleteOutput<'a> {
    kind: RecordKind,
    name: &'a str,
    deleted: bool,
}

/// Output for list.
#[derive(Serialize)]
struct ListOutput {
    kind: RecordKind,
    items: Vec<ListItem>,
    count: usize,
}

#[derive(Serialize)]
struct ListItem {
    name: String,
    updated_at: i64,
}

/// Output for binary get.
#[derive(Serialize)]
struct BinaryOutput<'a> {
    name: &'a str,
    path: String,
    bytes: usize,
    updated_at: i64,
}

/// A record built from command-line input, ready to store.
enum Draft {
    Login(Record<LoginPayload>),
    Card(Record<CardPayload>),
    Text(Record<TextPayload>),
    Binary(Record<BinaryPayload>),
}

fn draft(input: &RecordInput, owner: i64) -> Result<Draft> {
    validate_name(input.name())?;

    Ok(match input {
        RecordInput::Login {
            name,
            login,
            password,
        } => Draft::Login(Record::new(
            name.as_str(),
            owner,
            LoginPayload {
                login: login.clone(),
                secret: password.clone(),
            },
        )),
        RecordInput::Card {
            name,
            number,
            expiry,
            cvv,
        } => Draft::Card(Record::new(
            name.as_str(),
            owner,
            card_payload(number, expiry, cvv)?,
        )),
        RecordInput::Text { name, text } => Draft::Text(Record::new(
            name.as_str(),
            owner,
            TextPayload { text: text.clone() },
        )),
        RecordInput::Binary { name, file } => {
            let data = std::fs::read(file).map_err(|e| {
                Error::InvalidArgument(format!("cannot read {}: {e}", file.display()))
            })?;
            Draft::Binary(Record::new(name.as_str(), owner, BinaryPayload { data }))
        }
    })
}

fn signed_in(session_file: Option<&Path>) -> Result<Session> {
    session::resolve(&session_path(session_file)?)
}

/// Save a new record.
///
/// # Errors
///
/// Returns `AlreadyExists` if the name is taken for this kind.
pub fn save(
    input: &RecordInput,
    db_path: Option<&Path>,
    session_file: Option<&Path>,
    json: bool,
) -> Result<()> {
    let session = signed_in(session_file)?;
    let draft = draft(input, session.user_id)?;
    let mut storage = open_storage(db_path)?;

    let id = match &draft {
        Draft::Login(r) => storage.save(r)?,
        Draft::Card(r) => storage.save(r)?,
        Draft::Text(r) => storage.save(r)?,
        Draft::Binary(r) => storage.save(r)?,
    };

    let kind = input.kind();
    let name = input.name();
    if json {
        println!("{}", serde_json::to_string(&SaveOutput { kind, name, id })?);
    } else {
        println!("{} Saved {kind} {}", "✓".green(), name.bold());
    }
    Ok(())
}

/// Overwrite an existing record.
///
/// A missing name is not an error: nothing changes and the output says so.
///
/// # Errors
///
/// Returns an error if the input is invalid or the write fails.
pub fn update(
    input: &RecordInput,
    db_path: Option<&Path>,
    session_file: Option<&Path>,
    json: bool,
) -> Result<()> {
    let session = signed_in(session_file)?;
    let draft = draft(input, session.user_id)?;
    let mut storage = open_storage(db_path)?;

    let (updated, deleted) = match &draft {
        Draft::Login(r) => update_one(&mut storage, r)?,
        Draft::Card(r) => update_one(&mut storage, r)?,
        Draft::Text(r) => update_one(&mut storage, r)?,
        Draft::Binary(r) => update_one(&mut storage, r)?,
    };

    let kind = input.kind();
    let name = input.name();
    if json {
        println!(
            "{}",
            serde_json::to_string(&UpdateOutput {
                kind,
                name,
                updated,
                deleted
            })?
        );
    } else if deleted {
        println!(
            "{}",
            format!("{kind} '{name}' is deleted; its content was replaced but it stays deleted")
                .yellow()
        );
    } else if updated {
        println!("{} Updated {kind} {}", "✓".green(), name.bold());
    } else {
        println!(
            "{}",
            format!("No {kind} named '{name}'; nothing changed").yellow()
        );
    }
    Ok(())
}

/// Overwrite a record; reports whether a row matched and whether it is a tombstone.
fn update_one<P: TableRow>(
    storage: &mut SqliteStorage,
    record: &Record<P>,
) -> Result<(bool, bool)> {
    if !storage.update(record)? {
        return Ok((false, false));
    }
    match storage.get_by_name::<P>(record.owner, &record.name) {
        Ok(_) => Ok((true, false)),
        Err(Error::NotFound { .. }) => Ok((true, true)),
        Err(e) => Err(e),
    }
}

/// Fetch a live record, printing close names on a miss.
fn lookup<P: TableRow>(
    storage: &SqliteStorage,
    owner: i64,
    name: &str,
    json: bool,
) -> Result<Record<P>> {
    match storage.get_by_name::<P>(owner, name) {
        Err(err @ Error::NotFound { .. }) => {
            if !json {
                let names: Vec<String> = storage
                    .get_all::<P>(owner)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|r| r.name)
                    .collect();
                let similar = find_similar_names(name, &names, 3);
                if !similar.is_empty() {
                    eprintln!("Did you mean: {}?", similar.join(", "));
                }
            }
            Err(err)
        }
        other => other,
    }
}

/// Default export path for binary data: `<name>.bin` in the working directory.
fn default_out_path(name: &str) -> PathBuf {
    let safe: String = name
        .chars()
        .map(|c| if std::path::is_separator(c) { '_' } else { c })
        .collect();
    PathBuf::from(format!("{safe}.bin"))
}

/// Show one record. Binary data is written to `out` instead of printed.
///
/// # Errors
///
/// Returns `NotFound` if there is no live record with this name.
pub fn get(
    kind: RecordKind,
    name: &str,
    out: Option<&Path>,
    db_path: Option<&Path>,
    session_file: Option<&Path>,
    json: bool,
) -> Result<()> {
    let session = signed_in(session_file)?;
    let storage = open_storage(db_path)?;
    let owner = session.user_id;

    match kind {
        RecordKind::Login => {
            let record = lookup::<LoginPayload>(&storage, owner, name, json)?;
            if json {
                println!("{}", serde_json::to_string(&record)?);
            } else {
                println!("{} ({kind})", record.name.bold());
                println!("  Login:    {}", record.payload.login);
                println!("  Password: {}", record.payload.secret);
                println!("  Updated:  {}", format_time(record.updated_at).dimmed());
            }
        }
        RecordKind::Card => {
            let record = lookup::<CardPayload>(&storage, owner, name, json)?;
            if json {
                println!("{}", serde_json::to_string(&record)?);
            } else {
                println!("{} ({kind})", record.name.bold());
                println!("  Number:  {}", record.payload.number);
                println!("  Expiry:  {}", record.payload.expiry);
                println!("  CVV:     {}", record.payload.cvv);
                println!("  Updated: {}", format_time(record.updated_at).dimmed());
            }
        }
        RecordKind::Text => {
            let record = lookup::<TextPayload>(&storage, owner, name, json)?;
            if json {
                println!("{}", serde_json::to_string(&record)?);
            } else {
                println!("{} ({kind})", record.name.bold());
                println!("{}", record.payload.text);
            }
        }
        RecordKind::Binary => {
            let record = lookup::<BinaryPayload>(&storage, owner, name, json)?;
            let path = out.map_or_else(|| default_out_path(&record.name), Path::to_path_buf);
            atomic_write(&path, &record.payload.data, false)?;

            if json {
                let output = BinaryOutput {
                    name: &record.name,
                    path: path.display().to_string(),
                    bytes: record.payload.data.len(),
                    updated_at: record.updated_at,
                };
                println!("{}", serde_json::to_string(&output)?);
            } else {
                println!(
                    "{} Wrote {} bytes to {}",
                    "✓".green(),
                    record.payload.data.len(),
                    path.display()
                );
            }
        }
    }
    Ok(())
}

fn list_items<P: TableRow>(storage: &SqliteStorage, owner: i64) -> Result<Vec<ListItem>> {
    Ok(storage
        .get_all::<P>(owner)?
        .into_iter()
        .map(|r| ListItem {
            name: r.name,
            updated_at: r.updated_at,
        })
        .collect())
}

/// List the names of all live records of one kind.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub fn list(
    kind: RecordKind,
    db_path: Option<&Path>,
    session_file: Option<&Path>,
    json: bool,
) -> Result<()> {
    let session = signed_in(session_file)?;
    let storage = open_storage(db_path)?;
    let owner = session.user_id;

    let items = match kind {
        RecordKind::Login => list_items::<LoginPayload>(&storage, owner)?,
        RecordKind::Card => list_items::<CardPayload>(&storage, owner)?,
        RecordKind::Text => list_items::<TextPayload>(&storage, owner)?,
        RecordKind::Binary => list_items::<BinaryPayload>(&storage, owner)?,
    };

    if json {
        let output = ListOutput {
            kind,
            count: items.len(),
            items,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No {kind} records.");
        return Ok(());
    }
    for item in &items {
        println!("  {}  {}", item.name.bold(), format_time(item.updated_at).dimmed());
    }
    println!("{} {kind} record(s)", items.len());
    Ok(())
}

/// Delete a record. Deleting a missing name is not an error.
///
/// # Errors
///
/// Returns an error if the store cannot be written.
pub fn delete(
    kind: RecordKind,
    name: &str,
    db_path: Option<&Path>,
    session_file: Option<&Path>,
    json: bool,
) -> Result<()> {
    let session = signed_in(session_file)?;
    let mut storage = open_storage(db_path)?;

    let deleted = storage.delete(kind, session.user_id, name)?;

    if json {
        println!(
            "{}",
            serde_json::to_string(&DeleteOutput {
                kind,
                name,
                deleted
            })?
        );
    } else if deleted {
        println!("{} Deleted {kind} {}", "✓".green(), name.bold());
    } else {
        println!("No {kind} named '{name}'");
    }
    Ok(())
}
