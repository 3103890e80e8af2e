//! Keeper CLI entry point.

use clap::Parser;
use keeper::cli::commands;
use keeper::cli::{Cli, Commands, OutputFormat};
use keeper::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: --json OR --format json OR non-TTY stdout
    let json = cli.json
        || cli.format == OutputFormat::Json
        || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info,reqwest=info,hyper=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    let db = cli.db.as_deref();
    let session_file = cli.session_file.as_deref();

    match &cli.command {
        Commands::Version => commands::version::execute(json),

        // Account
        Commands::Register { login, password } => {
            commands::account::register(login, password, db, session_file, json)
        }
        Commands::Login { login, password } => {
            commands::account::login(login, password, db, session_file, json)
        }
        Commands::Logout => commands::account::logout(session_file, json),
        Commands::Whoami => commands::account::whoami(session_file, json),

        // Records
        Commands::Save { record } => commands::records::save(record, db, session_file, json),
        Commands::Update { record } => commands::records::update(record, db, session_file, json),
        Commands::Get { kind, name, out } => {
            commands::records::get(*kind, name, out.as_deref(), db, session_file, json)
        }
        Commands::List { kind } => commands::records::list(*kind, db, session_file, json),
        Commands::Delete { kind, name } => {
            commands::records::delete(*kind, name, db, session_file, json)
        }

        // Sync
        Commands::Sync => commands::sync::execute(
            db,
            session_file,
            cli.server.as_deref(),
            cli.timeout_secs,
            json,
        ),

        // Shell completions
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
