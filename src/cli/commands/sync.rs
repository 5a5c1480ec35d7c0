//! Sync command implementations.
//!
//! Every variant except `status` first runs user-switch cleanup, so a
//! previous user's rows are never pushed under the current user.

use std::path::PathBuf;

use colored::Colorize;
use serde::Serialize;

use crate::cli::SyncCommands;
use crate::error::Result;
use crate::storage::OwnerCount;
use crate::sync::{SyncOutcome, SyncStatus, print_status, print_sync_report};

use super::app::{App, Engine, block_on, print_json};

/// Output for `sync status`.
#[derive(Serialize)]
struct StatusOutput<'a> {
    #[serde(flatten)]
    status: &'a SyncStatus,
    owners: Vec<OwnerCount>,
}

/// Execute sync commands.
pub fn execute(command: Option<SyncCommands>, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let app = App::open(db_path, false)?;
    let command = command.unwrap_or(SyncCommands::Run);
    block_on(execute_async(command, &app.engine, json))?
}

async fn execute_async(command: SyncCommands, engine: &Engine, json: bool) -> Result<()> {
    match command {
        SyncCommands::Status => {
            let status = engine.status().await?;
            let owners = engine.local().owner_counts()?;
            if json {
                return print_json(&StatusOutput {
                    status: &status,
                    owners,
                });
            }
            print_status(&status);
            if owners.len() > 1 {
                println!();
                println!("{}", "Records by user:".blue().bold());
                for entry in &owners {
                    println!("  {:<14} {}", entry.owner, entry.records);
                }
            }
            Ok(())
        }
        SyncCommands::Run => match engine.sync_all(&prepare(engine).await?).await? {
            SyncOutcome::Completed(report) if json => print_json(&report),
            SyncOutcome::Completed(report) => {
                print_sync_report(&report);
                Ok(())
            }
            SyncOutcome::AlreadyRunning => already_running(json),
        },
        SyncCommands::Pull => {
            let stats = engine.pull_and_merge(&prepare(engine).await?).await?;
            if json {
                return print_json(&stats);
            }
            println!(
                "Pulled {} new records ({} already present)",
                stats.added, stats.skipped
            );
            if stats.invalid > 0 {
                println!(
                    "{}",
                    format!("Skipped {} remote records with invalid coordinates", stats.invalid)
                        .yellow()
                );
            }
            Ok(())
        }
        SyncCommands::Push => match engine.push_if_idle(&prepare(engine).await?).await? {
            SyncOutcome::Completed(report) if json => print_json(&report),
            SyncOutcome::Completed(report) if report.noop => {
                println!("{}", "Nothing to push.".dimmed());
                Ok(())
            }
            SyncOutcome::Completed(report) => {
                println!(
                    "Pushed {} records ({} kept from remote)",
                    report.written, report.remote_only
                );
                Ok(())
            }
            SyncOutcome::AlreadyRunning => already_running(json),
        },
    }
}

/// The current user, after user-switch cleanup.
async fn prepare(engine: &Engine) -> Result<String> {
    let user = engine.session().require_user()?;
    engine.reconcile_user_switch().await;
    Ok(user)
}

fn already_running(json: bool) -> Result<()> {
    if json {
        print_json(&serde_json::json!({ "skipped": "sync already in progress" }))
    } else {
        println!("{}", "Sync already in progress.".dimmed());
        Ok(())
    }
}
