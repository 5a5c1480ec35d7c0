//! Login and logout.

use std::path::PathBuf;

use colored::Colorize;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::storage::LocalStore;
use crate::sync::{LogoutOptions, SwitchCleanup, print_logout_report, print_step};

use super::app::{App, block_on, print_json};

#[derive(Serialize)]
struct LoginOutput<'a> {
    user: &'a str,
    cleanup: &'a SwitchCleanup,
    records: u64,
}

/// Log in and isolate the device to the new user.
///
/// Only local cleanup runs here; `resume` or `sync` talks to the remote.
pub fn login(username: &str, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let app = App::open(db_path, true)?;
    let session = app.engine.session();
    session.login(username)?;
    let user = session.require_user()?;

    let (cleanup, records) = block_on(async {
        let cleanup = app.engine.reconcile_user_switch().await;
        let records = app.engine.local().count_for_owner(&user).await?;
        Ok::<_, Error>((cleanup, records))
    })??;

    if json {
        return print_json(&LoginOutput {
            user: &user,
            cleanup: &cleanup,
            records,
        });
    }

    println!("Logged in as {}", user.bold());
    if cleanup.switched {
        print_step("Previous user's records removed", &cleanup.outcome);
        if cleanup.outcome.is_succeeded() {
            println!("  Removed {} records", cleanup.purged);
        }
    }
    println!("  {records} records on this device");
    println!("{}", "Run 'fieldsync resume' to sync.".dimmed());
    Ok(())
}

/// End the session, optionally deleting remote and local data.
pub fn logout(delete_remote: bool, purge: bool, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let app = App::open(db_path, false)?;
    let options = LogoutOptions {
        delete_remote,
        purge_local: purge,
    };
    let report = block_on(app.engine.logout(options))??;

    if json {
        print_json(&report)
    } else {
        print_logout_report(&report);
        Ok(())
    }
}
