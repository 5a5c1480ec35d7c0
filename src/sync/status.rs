//! Sync status display.

use colored::Colorize;

use super::types::{LogoutReport, StepOutcome, SyncReport, SyncStatus};

/// Print sync status to stdout in a human-readable format.
pub fn print_status(status: &SyncStatus) {
    println!("{}", "Sync Status".bold().underline());
    println!();

    println!("{}", "Session:".blue().bold());
    match &status.user {
        Some(user) => println!("  User:          {user}"),
        None => println!("  User:          {}", "(not logged in)".dimmed()),
    }
    if let Some(last) = &status.last_user {
        println!("  Last user:     {last}");
    }
    println!();

    println!("{}", "Local Data:".blue().bold());
    println!("  Yours:         {}", status.local_records);
    if status.foreign_records > 0 {
        println!("  Other users:   {}", status.foreign_records);
    }
    println!("  {}:         {}", "Total".bold(), status.total_records);
    println!();

    if status.switch_pending {
        println!("{}", "User switch pending:".yellow().bold());
        println!(
            "  {} records of other users will be removed on next resume.",
            status.foreign_records
        );
        println!();
        println!("{}", "Run 'fieldsync resume' to clean up and sync.".dimmed());
    } else if status.syncing {
        println!("{}", "Sync in progress.".yellow());
    } else if status.user.is_none() {
        println!("{}", "Run 'fieldsync login <user>' to start.".dimmed());
    } else {
        println!("{}", "Ready.".green());
    }
}

/// Print the result of a sync run.
pub fn print_sync_report(report: &SyncReport) {
    println!("{}", "Sync complete".green().bold());
    println!(
        "  Pulled:  {} new, {} already present",
        report.pulled.added, report.pulled.skipped
    );
    if report.pushed.noop {
        println!("  Pushed:  {}", "nothing to push".dimmed());
    } else {
        println!(
            "  Pushed:  {} records ({} kept from remote)",
            report.pushed.written, report.pushed.remote_only
        );
    }

    let conflicts = report.pulled.conflicts + report.pushed.conflicts;
    if conflicts > 0 {
        println!(
            "  {} {} shared tags differ; local copies were kept",
            "!".yellow(),
            conflicts
        );
    }
    if report.pulled.invalid > 0 {
        println!(
            "  {} {} remote records had invalid coordinates and were not pulled",
            "!".yellow(),
            report.pulled.invalid
        );
    }
}

/// Print the steps of a logout.
pub fn print_logout_report(report: &LogoutReport) {
    println!("Logged out {}", report.user.bold());
    print_step("Remote delete", &report.remote_delete);
    print_step("Local purge", &report.local_purge);
    if report.local_purge.is_succeeded() {
        println!("  Removed {} local records", report.purged);
    }
    if report.is_partial() {
        println!("{}", "Logout completed partially.".yellow());
    }
}

/// Print one step outcome on a single line.
pub fn print_step(label: &str, step: &StepOutcome) {
    match step {
        StepOutcome::NotRequested => {}
        StepOutcome::Succeeded => println!("  {label}: {}", "ok".green()),
        StepOutcome::Skipped { reason } => println!("  {label}: {}", reason.dimmed()),
        StepOutcome::Failed { error } => println!("  {label}: {} ({error})", "failed".red()),
    }
}
