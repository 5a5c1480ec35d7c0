//! Sync types.
//!
//! Configuration, statistics and reports returned by the sync engine.

use std::time::Duration;

use serde::Serialize;

use crate::model::LocalRecord;

/// Default bound on a single push.
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(15);

/// Default bound on a whole pull-then-push run.
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(20);

/// Default opportunistic sync cadence (every record).
pub const DEFAULT_SYNC_EVERY: u32 = 1;

/// Engine tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Upper bound for `push`.
    pub push_timeout: Duration,
    /// Upper bound for `sync_all`.
    pub sync_timeout: Duration,
    /// Push after every N-th captured record. `0` disables opportunistic sync.
    pub sync_every: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            push_timeout: DEFAULT_PUSH_TIMEOUT,
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
            sync_every: DEFAULT_SYNC_EVERY,
        }
    }
}

impl SyncConfig {
    /// Whether an owner holding `count` local records is due a push.
    #[must_use]
    pub fn sync_due(&self, count: u64) -> bool {
        self.sync_every > 0 && count > 0 && count % u64::from(self.sync_every) == 0
    }
}

/// Result of merging one side's records into the other.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Records taken over from the other side.
    pub added: usize,
    /// Records dropped because their tag was already present.
    pub skipped: usize,
    /// Skipped records whose content differed from the kept copy.
    pub conflicts: usize,
    /// Incoming records rejected by validation (bad coordinates).
    pub invalid: usize,
}

impl MergeStats {
    /// Total records examined.
    #[must_use]
    pub fn total(&self) -> usize {
        self.added + self.skipped + self.invalid
    }
}

/// Result of a push.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PushReport {
    /// Records written to the remote bundle.
    pub written: usize,
    /// Distinct local records included.
    pub local: usize,
    /// Remote records kept because no local record has their tag.
    pub remote_only: usize,
    /// Local rows dropped as duplicates of an earlier tag.
    pub duplicates: usize,
    /// Shared tags whose remote content differed from the local copy.
    pub conflicts: usize,
    /// Nothing to push: the owner has no local records.
    pub noop: bool,
}

/// Result of a full pull-then-push run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub pulled: MergeStats,
    pub pushed: PushReport,
}

/// Outcome of an operation protected by the in-flight guard.
#[derive(Debug)]
pub enum SyncOutcome<T> {
    /// The operation ran to completion.
    Completed(T),
    /// Another sync was already running; nothing was done.
    AlreadyRunning,
}

impl<T> SyncOutcome<T> {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// The completed value, if any.
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::AlreadyRunning => None,
        }
    }
}

/// Independently reported step of a compound operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    NotRequested,
    Succeeded,
    Skipped { reason: String },
    Failed { error: String },
}

impl StepOutcome {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// What logout should do besides closing the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogoutOptions {
    /// Delete the user's remote bundle.
    pub delete_remote: bool,
    /// Delete every local record.
    pub purge_local: bool,
}

/// Result of logout: two independent sub-operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogoutReport {
    pub user: String,
    pub remote_delete: StepOutcome,
    pub local_purge: StepOutcome,
    /// Local rows removed by the purge.
    pub purged: usize,
}

impl LogoutReport {
    /// No requested step failed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.remote_delete.is_failed() && !self.local_purge.is_failed()
    }

    /// One requested step succeeded and the other failed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        let steps = [&self.remote_delete, &self.local_purge];
        steps.iter().any(|s| s.is_succeeded()) && steps.iter().any(|s| s.is_failed())
    }
}

/// Result of user-switch cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchCleanup {
    /// Whether a user switch was detected.
    pub switched: bool,
    pub outcome: StepOutcome,
    /// Rows of other owners removed.
    pub purged: usize,
}

/// Result of resuming a session.
#[derive(Debug, Clone, Serialize)]
pub struct ResumeReport {
    pub user: String,
    pub cleanup: SwitchCleanup,
    pub sync: StepOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_report: Option<SyncReport>,
    /// The current user's local records after sync.
    pub records: Vec<LocalRecord>,
}

/// Local sync state for display.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    /// Logged-in user, if any.
    pub user: Option<String>,
    /// User whose data was last known to be alone on the device.
    pub last_user: Option<String>,
    /// A user switch is pending cleanup.
    pub switch_pending: bool,
    /// Records owned by the current user.
    pub local_records: u64,
    /// Records owned by anyone else.
    pub foreign_records: u64,
    /// All local records.
    pub total_records: u64,
    /// A sync run is in progress in this process.
    pub syncing: bool,
}
