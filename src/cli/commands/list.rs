//! List and resume commands.

use std::path::PathBuf;

use colored::Colorize;

use crate::error::Result;
use crate::model::LocalRecord;
use crate::storage::LocalStore;
use crate::sync::{print_step, print_sync_report};

use super::app::{App, block_on, print_json};

/// List the current user's records, or every row with `all`.
pub fn list(all: bool, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let app = App::open(db_path, false)?;
    let records = block_on(async {
        if all {
            app.engine.local().list_all().await
        } else {
            app.engine.load_records().await
        }
    })??;

    if json {
        return print_json(&records);
    }
    print_records(&records, all);
    Ok(())
}

/// Clean up after a user switch, sync, then list.
pub fn resume(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let app = App::open(db_path, false)?;
    let report = block_on(app.engine.resume())??;

    if json {
        return print_json(&report);
    }

    println!("Resumed session for {}", report.user.bold());
    if report.cleanup.switched {
        print_step("Previous user's records removed", &report.cleanup.outcome);
    }
    match &report.sync_report {
        Some(sync) => print_sync_report(sync),
        None => print_step("Sync", &report.sync),
    }
    println!();
    print_records(&report.records, false);
    Ok(())
}

fn print_records(records: &[LocalRecord], with_owner: bool) {
    if records.is_empty() {
        println!("{}", "No records.".dimmed());
        return;
    }

    for row in records {
        let r = &row.record;
        let owner = if with_owner {
            format!(" [{}]", row.owner)
        } else {
            String::new()
        };
        println!(
            "{:>5}  {} {:>10.5} {:>11.5}  {}{}",
            row.id,
            format!("{:<16}", r.tag).bold(),
            r.latitude,
            r.longitude,
            r.note,
            owner.dimmed()
        );
    }
    println!("{}", format!("{} records", records.len()).dimmed());
}
