//! Record capture: `scan` and `add`.

use std::path::PathBuf;

use colored::Colorize;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::ingest::{Ingested, SyncState};
use crate::model::LocalRecord;

use super::app::{App, block_on, print_json};

#[derive(Serialize)]
struct CaptureOutput<'a> {
    id: i64,
    tag: &'a str,
    owner: &'a str,
    synced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    sync_error: Option<&'a str>,
}

/// Ingest a scanned payload.
pub fn scan(payload: &str, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let app = App::open(db_path, false)?;
    let pipeline = app.pipeline();
    let (record, state) = block_on(async {
        let ingested = pipeline.ingest_scan(payload).await?;
        Ok::<_, Error>(settle(ingested).await)
    })??;
    report(&record, &state, json)
}

/// Ingest a hand-typed `tag-latitude-longitude-note` record.
pub fn add(raw: &str, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let app = App::open(db_path, false)?;
    let pipeline = app.pipeline();
    let (record, state) = block_on(async {
        let ingested = pipeline.ingest_manual(raw).await?;
        Ok::<_, Error>(settle(ingested).await)
    })??;
    report(&record, &state, json)
}

/// Wait for the opportunistic push so the process does not exit under it.
async fn settle(ingested: Ingested) -> (LocalRecord, SyncState) {
    let Ingested { record, sync } = ingested;
    (record, sync.resolve().await)
}

fn report(record: &LocalRecord, state: &SyncState, json: bool) -> Result<()> {
    if json {
        let sync_error = match state {
            SyncState::NotSynced { reason } => Some(reason.as_str()),
            SyncState::NotDue | SyncState::Synced(_) => None,
        };
        return print_json(&CaptureOutput {
            id: record.id,
            tag: record.tag(),
            owner: &record.owner,
            synced: matches!(state, SyncState::Synced(_)),
            sync_error,
        });
    }

    match state.annotation() {
        Some(note) => println!("{} {}", record.tag().bold(), note.yellow()),
        None => println!("{}", record.tag().bold()),
    }
    Ok(())
}
