//! fieldsync CLI entry point.

use clap::Parser;
use fieldsync::cli::commands;
use fieldsync::cli::{Cli, Commands};
use fieldsync::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: --json OR non-TTY stdout
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

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
            2 => EnvFilter::new("debug,rusqlite=info,reqwest=info,hyper_util=info"),
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
    let db = cli.db.as_ref();
    match &cli.command {
        Commands::Login { username } => commands::session::login(username, db, json),
        Commands::Logout {
            delete_remote,
            purge,
        } => commands::session::logout(*delete_remote, *purge, db, json),

        // Capture
        Commands::Scan { payload } => commands::capture::scan(payload, db, json),
        Commands::Add { raw } => commands::capture::add(raw, db, json),

        // Sync
        Commands::Sync { command } => commands::sync::execute(*command, db, json),
        Commands::List { all } => commands::list::list(*all, db, json),
        Commands::Resume => commands::list::resume(db, json),

        // Shell completions
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
