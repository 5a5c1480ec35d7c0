//! Ingestion pipeline.
//!
//! One payload moves through
//! `Validating → Verifying → Persisting → OpportunisticSync → Done`,
//! stopping at the first failing stage. Nothing is retried. The
//! opportunistic push runs on its own task and never fails ingestion.

use std::fmt;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codec;
use crate::error::{Error, Result};
use crate::model::LocalRecord;
use crate::remote::RemoteStore;
use crate::storage::LocalStore;
use crate::sync::{PushReport, SyncEngine, SyncOutcome};

use super::verifier::BoxedVerifier;

/// Annotation shown when a record was stored but not pushed.
pub const NOT_SYNCED: &str = "(not synced)";

/// Pipeline stage, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Verifying,
    Persisting,
    OpportunisticSync,
    Done,
    Failed,
}

impl Stage {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Verifying => "verifying",
            Self::Persisting => "persisting",
            Self::OpportunisticSync => "opportunistic_sync",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle on the push triggered by an ingestion.
#[derive(Debug)]
pub enum SyncTicket {
    /// The cadence did not call for a push.
    NotDue,
    /// A push was due but could not be started.
    Skipped(String),
    /// A push is running on its own task.
    Spawned(JoinHandle<Result<SyncOutcome<PushReport>>>),
}

/// Final state of an opportunistic push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    NotDue,
    Synced(PushReport),
    NotSynced { reason: String },
}

impl SyncState {
    /// Text to append to the tag, if any.
    #[must_use]
    pub fn annotation(&self) -> Option<&'static str> {
        match self {
            Self::NotSynced { .. } => Some(NOT_SYNCED),
            Self::NotDue | Self::Synced(_) => None,
        }
    }
}

impl SyncTicket {
    /// Wait for the push, if one was started, and report how it ended.
    pub async fn resolve(self) -> SyncState {
        match self {
            Self::NotDue => SyncState::NotDue,
            Self::Skipped(reason) => SyncState::NotSynced { reason },
            Self::Spawned(handle) => match handle.await {
                Ok(Ok(SyncOutcome::Completed(report))) => SyncState::Synced(report),
                Ok(Ok(SyncOutcome::AlreadyRunning)) => SyncState::NotSynced {
                    reason: "sync already in progress".to_string(),
                },
                Ok(Err(e)) => SyncState::NotSynced {
                    reason: e.to_string(),
                },
                Err(e) => SyncState::NotSynced {
                    reason: format!("sync task failed: {e}"),
                },
            },
        }
    }
}

/// Result of ingesting one payload.
#[derive(Debug)]
pub struct Ingested {
    pub record: LocalRecord,
    pub sync: SyncTicket,
}

impl Ingested {
    #[must_use]
    pub fn tag(&self) -> &str {
        self.record.tag()
    }
}

/// Turns scanned or typed input into stored records.
pub struct IngestPipeline<L, R> {
    engine: SyncEngine<L, R>,
    verifier: BoxedVerifier,
}

impl<L, R> IngestPipeline<L, R>
where
    L: LocalStore + 'static,
    R: RemoteStore + 'static,
{
    pub fn new(engine: SyncEngine<L, R>, verifier: BoxedVerifier) -> Self {
        Self { engine, verifier }
    }

    #[must_use]
    pub fn engine(&self) -> &SyncEngine<L, R> {
        &self.engine
    }

    /// Ingest a scanned payload (base64 or flat text, as the verifier
    /// accepts it).
    ///
    /// # Errors
    ///
    /// Returns the error of the failing stage: `NoActiveUser` or
    /// `InvalidInputFormat` while validating, `ValidationRejected` or a
    /// transport error while verifying, `Persistence` while persisting
    /// (including verified data that does not decode).
    pub async fn ingest_scan(&self, payload: &str) -> Result<Ingested> {
        let mut stage = Stage::Validating;
        let result = self.run(payload, &mut stage).await;
        if let Err(e) = &result {
            warn!(stage = %stage, error = %e, "Ingestion failed");
            advance(&mut stage, Stage::Failed);
        }
        result
    }

    /// Ingest a typed `tag-latitude-longitude-note` string.
    ///
    /// The input is shape-checked and normalized to the flat format, then
    /// encoded and handed to [`ingest_scan`](Self::ingest_scan).
    ///
    /// # Errors
    ///
    /// Returns `InvalidInputFormat` for a malformed shape, `InvalidFormat`
    /// for bad field values, or any error of the scan path.
    pub async fn ingest_manual(&self, raw: &str) -> Result<Ingested> {
        let flat = codec::check_manual_shape(raw).and_then(|()| codec::format(raw));
        let flat = match flat {
            Ok(flat) => flat,
            Err(e) => {
                warn!(stage = %Stage::Validating, error = %e, "Manual input rejected");
                return Err(e);
            }
        };
        self.ingest_scan(&codec::encode_payload(&flat)).await
    }

    async fn run(&self, payload: &str, stage: &mut Stage) -> Result<Ingested> {
        let user = self.engine.session().require_user()?;
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(Error::InvalidInputFormat("payload is empty".to_string()));
        }

        advance(stage, Stage::Verifying);
        let verdict = self.verifier.verify(payload).await?;
        if !verdict.accepted {
            return Err(Error::ValidationRejected(verdict.status));
        }

        advance(stage, Stage::Persisting);
        let record = codec::decode_strict(&verdict.data)
            .map_err(|e| Error::Persistence(format!("verified data does not decode: {e}")))?;
        let stored = self
            .engine
            .local()
            .insert(&record, &user)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        info!(user = %user, tag = %stored.tag(), id = stored.id, "Record stored");

        advance(stage, Stage::OpportunisticSync);
        let sync = self.schedule_push(&user).await;

        advance(stage, Stage::Done);
        Ok(Ingested {
            record: stored,
            sync,
        })
    }

    async fn schedule_push(&self, user: &str) -> SyncTicket {
        let count = match self.engine.local().count_for_owner(user).await {
            Ok(count) => count,
            Err(e) => {
                warn!(user = %user, error = %e, "Could not count records, skipping sync");
                return SyncTicket::Skipped(e.to_string());
            }
        };
        if !self.engine.config().sync_due(count) {
            debug!(user = %user, count, "Opportunistic sync not due");
            return SyncTicket::NotDue;
        }

        let engine = self.engine.clone();
        let user = user.to_string();
        SyncTicket::Spawned(tokio::spawn(async move {
            let outcome = engine.push_if_idle(&user).await;
            if let Err(e) = &outcome {
                warn!(user = %user, error = %e, "Opportunistic sync failed");
            }
            outcome
        }))
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!(from = %stage, to = %next, "Ingestion stage");
    *stage = next;
}
