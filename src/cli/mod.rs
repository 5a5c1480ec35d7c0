//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// fieldsync - Offline-first capture and sync of tagged geolocation records
#[derive(Parser, Debug)]
#[command(name = "fieldsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.fieldsync/data/fieldsync.db)
    #[arg(long, global = true, env = "FIELDSYNC_DB")]
    pub db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a session as USERNAME
    ///
    /// Logging in as a different user than last time removes the previous
    /// user's records from this device.
    Login {
        /// Username
        username: String,
    },

    /// End the current session
    Logout {
        /// Also delete your records from the remote store
        #[arg(long)]
        delete_remote: bool,

        /// Also delete every record stored on this device
        #[arg(long)]
        purge: bool,
    },

    /// Ingest a scanned payload
    Scan {
        /// Scanned payload (base64 or tag1d:...-latitud:...-longitud:...-observacion:...)
        payload: String,
    },

    /// Add a record typed by hand
    Add {
        /// Record as tag-latitude-longitude-note (e.g. "ABC-10.5--75.2-gate")
        raw: String,
    },

    /// Sync with the remote store (pull, then push)
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },

    /// List stored records
    List {
        /// Include records of every user on this device
        #[arg(long)]
        all: bool,
    },

    /// Clean up after a user switch, sync, and list your records
    Resume,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
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

// ============================================================================
// Sync Commands
// ============================================================================

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCommands {
    /// Pull then push (default)
    Run,

    /// Only fetch records from the remote store
    Pull,

    /// Only send local records to the remote store
    Push,

    /// Show sync status
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sync_defaults_to_no_subcommand() {
        let cli = Cli::parse_from(["fieldsync", "sync"]);
        assert!(matches!(cli.command, Commands::Sync { command: None }));
    }

    #[test]
    fn test_negative_coordinates_parse_as_value() {
        let cli = Cli::parse_from(["fieldsync", "add", "--", "-X-1--2-"]);
        assert!(matches!(cli.command, Commands::Add { ref raw } if raw == "-X-1--2-"));
    }

    #[test]
    fn test_logout_flags() {
        let cli = Cli::parse_from(["fieldsync", "logout", "--delete-remote", "--purge"]);
        assert!(matches!(
            cli.command,
            Commands::Logout {
                delete_remote: true,
                purge: true
            }
        ));
    }
}
