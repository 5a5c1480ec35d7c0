//! Sync engine.
//!
//! Orchestrates the exchange between the local store and the remote
//! bundle of one user:
//!
//! - **pull**: remote records whose tag is unknown locally are inserted
//! - **push**: the local set plus remote-only records is merge-written back
//! - **sync_all**: pull, then push, under the in-flight guard and a deadline
//!
//! On session start it also enforces per-user isolation: when the active
//! user changed, rows of other users are purged before anything is loaded.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::model::{LocalRecord, RemoteBundle, SessionContext};
use crate::remote::RemoteStore;
use crate::storage::LocalStore;

use super::guard::InFlight;
use super::merge::{bundle_records, records_to_pull};
use super::types::{
    LogoutOptions, LogoutReport, MergeStats, PushReport, ResumeReport, StepOutcome, SwitchCleanup,
    SyncConfig, SyncOutcome, SyncReport, SyncStatus,
};

/// Pull/merge/push orchestrator. Cheap to clone; clones share the stores,
/// the session and the in-flight guard.
pub struct SyncEngine<L, R> {
    local: Arc<L>,
    remote: Arc<R>,
    session: Arc<SessionContext>,
    identity: Arc<dyn Identity>,
    config: SyncConfig,
    in_flight: InFlight,
}

impl<L, R> Clone for SyncEngine<L, R> {
    fn clone(&self) -> Self {
        Self {
            local: Arc::clone(&self.local),
            remote: Arc::clone(&self.remote),
            session: Arc::clone(&self.session),
            identity: Arc::clone(&self.identity),
            config: self.config,
            in_flight: self.in_flight.clone(),
        }
    }
}

/// Bound `fut` by `after`, reporting expiry as a timeout of `phase`.
async fn bounded<T>(
    phase: &'static str,
    after: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| Error::SyncTimeout { phase, after })?
}

impl<L, R> SyncEngine<L, R>
where
    L: LocalStore,
    R: RemoteStore,
{
    pub fn new(
        local: Arc<L>,
        remote: Arc<R>,
        session: Arc<SessionContext>,
        identity: Arc<dyn Identity>,
        config: SyncConfig,
    ) -> Self {
        Self {
            local,
            remote,
            session,
            identity,
            config,
            in_flight: InFlight::new(),
        }
    }

    #[must_use]
    pub fn local(&self) -> &Arc<L> {
        &self.local
    }

    #[must_use]
    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Whether a guarded sync is running.
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.in_flight.is_active()
    }

    /// Insert remote records whose tag is not present locally.
    ///
    /// Strictly additive: local rows are never modified or removed. Remote
    /// records with out-of-range coordinates are skipped and counted.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the bundle cannot be fetched, or a
    /// persistence error if inserting fails (nothing is inserted then).
    pub async fn pull_and_merge(&self, user: &str) -> Result<MergeStats> {
        let Some(bundle) = self.remote.get_bundle(user).await? else {
            debug!(user = %user, "No remote bundle to pull");
            return Ok(MergeStats::default());
        };

        let local = self.local.list_for_owner(user).await?;
        let (fresh, stats) = records_to_pull(&local, &bundle.records);
        if !fresh.is_empty() {
            self.local
                .insert_many(&fresh, user)
                .await
                .map_err(|e| Error::Persistence(e.to_string()))?;
        }

        info!(
            user = %user,
            added = stats.added,
            skipped = stats.skipped,
            conflicts = stats.conflicts,
            invalid = stats.invalid,
            "Pulled remote bundle"
        );
        Ok(stats)
    }

    /// Merge-write the user's records to the remote bundle, bounded by the
    /// push timeout.
    ///
    /// # Errors
    ///
    /// Returns `SyncTimeout` when the deadline passes, or the store error.
    pub async fn push(&self, user: &str) -> Result<PushReport> {
        bounded("push", self.config.push_timeout, self.push_unbounded(user)).await
    }

    async fn push_unbounded(&self, user: &str) -> Result<PushReport> {
        let local = self.local.list_for_owner(user).await?;
        if local.is_empty() {
            debug!(user = %user, "Nothing to push");
            return Ok(PushReport {
                noop: true,
                ..PushReport::default()
            });
        }

        // Re-read so records written by other devices since the pull survive.
        let remote = self
            .remote
            .get_bundle(user)
            .await?
            .map(|b| b.records)
            .unwrap_or_default();

        let (records, report) = bundle_records(&local, &remote);
        let now = Utc::now();
        let bundle = RemoteBundle {
            records,
            owner: user.to_string(),
            synced_at: Some(now.date_naive()),
            server_timestamp: now.timestamp_millis(),
            device_id: Some(self.identity.device_id()),
        };
        self.remote.merge_write_bundle(user, &bundle).await?;

        info!(
            user = %user,
            written = report.written,
            remote_only = report.remote_only,
            conflicts = report.conflicts,
            "Pushed bundle"
        );
        Ok(report)
    }

    /// Pull then push, at most one run per process, bounded by the sync
    /// timeout.
    ///
    /// A pull failure ends the run without pushing.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error, or `SyncTimeout`.
    pub async fn sync_all(&self, user: &str) -> Result<SyncOutcome<SyncReport>> {
        let Some(_guard) = self.in_flight.try_acquire() else {
            debug!(user = %user, "Sync already in progress, skipping");
            return Ok(SyncOutcome::AlreadyRunning);
        };

        let run = async {
            let pulled = self.pull_and_merge(user).await?;
            let pushed = self.push(user).await?;
            Ok(SyncReport { pulled, pushed })
        };

        match bounded("sync", self.config.sync_timeout, run).await {
            Ok(report) => Ok(SyncOutcome::Completed(report)),
            Err(e) => {
                warn!(user = %user, error = %e, "Sync failed");
                Err(e)
            }
        }
    }

    /// Push under the in-flight guard; a no-op while another sync runs.
    ///
    /// # Errors
    ///
    /// Returns the push error.
    pub async fn push_if_idle(&self, user: &str) -> Result<SyncOutcome<PushReport>> {
        let Some(_guard) = self.in_flight.try_acquire() else {
            debug!(user = %user, "Sync already in progress, skipping push");
            return Ok(SyncOutcome::AlreadyRunning);
        };
        self.push(user).await.map(SyncOutcome::Completed)
    }

    /// After a user switch, drop rows of every other owner.
    ///
    /// Only a successful purge marks the session clean; a failed purge is
    /// logged and tolerated so the user can keep working.
    pub async fn reconcile_user_switch(&self) -> SwitchCleanup {
        let session = self.session.snapshot();
        if !session.is_user_switch() {
            return SwitchCleanup {
                switched: false,
                outcome: StepOutcome::NotRequested,
                purged: 0,
            };
        }

        let user = session.username;
        info!(user = %user, previous = %session.last_username, "User switch detected");

        let purged = match self.local.delete_all_except_owner(&user).await {
            Ok(purged) => purged,
            Err(e) => {
                let err = Error::Purge(e.to_string());
                warn!(user = %user, error = %err, "Purge failed, continuing");
                return SwitchCleanup {
                    switched: true,
                    outcome: StepOutcome::Failed {
                        error: err.to_string(),
                    },
                    purged: 0,
                };
            }
        };

        let outcome = match self.session.mark_cleaned() {
            Ok(()) => StepOutcome::Succeeded,
            Err(e) => {
                warn!(user = %user, error = %e, "Could not record cleanup in session");
                StepOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        SwitchCleanup {
            switched: true,
            outcome,
            purged,
        }
    }

    /// Session start or app resume: isolate, sync, then load.
    ///
    /// A failed sync is recorded in the report; the local records are
    /// loaded either way.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveUser` without a session, or a persistence error if
    /// the final load fails.
    pub async fn resume(&self) -> Result<ResumeReport> {
        let user = self.session.require_user()?;
        let cleanup = self.reconcile_user_switch().await;

        let (sync, sync_report) = match self.sync_all(&user).await {
            Ok(SyncOutcome::Completed(report)) => (StepOutcome::Succeeded, Some(report)),
            Ok(SyncOutcome::AlreadyRunning) => (
                StepOutcome::Skipped {
                    reason: "sync already in progress".to_string(),
                },
                None,
            ),
            Err(e) => (
                StepOutcome::Failed {
                    error: e.to_string(),
                },
                None,
            ),
        };

        let records = self.local.list_for_owner(&user).await?;
        Ok(ResumeReport {
            user,
            cleanup,
            sync,
            sync_report,
            records,
        })
    }

    /// The current user's records, after user-switch cleanup.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveUser` without a session, or a persistence error.
    pub async fn load_records(&self) -> Result<Vec<LocalRecord>> {
        let user = self.session.require_user()?;
        self.reconcile_user_switch().await;
        self.local.list_for_owner(&user).await
    }

    /// End the session, optionally deleting the remote bundle and purging
    /// local rows. Each step is reported on its own; the session is closed
    /// regardless of their outcome.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveUser` without a session, or an error if the closed
    /// session cannot be persisted.
    pub async fn logout(&self, options: LogoutOptions) -> Result<LogoutReport> {
        let user = self.session.require_user()?;

        let remote_delete = if options.delete_remote {
            let delete = self.remote.delete_bundle(&user);
            match bounded("remote delete", self.config.push_timeout, delete).await {
                Ok(()) => {
                    info!(user = %user, "Deleted remote bundle");
                    StepOutcome::Succeeded
                }
                Err(e) => {
                    warn!(user = %user, error = %e, "Remote delete failed");
                    StepOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            }
        } else {
            StepOutcome::NotRequested
        };

        let (local_purge, purged) = if options.purge_local {
            match self.local.delete_all().await {
                Ok(purged) => (StepOutcome::Succeeded, purged),
                Err(e) => {
                    warn!(user = %user, error = %e, "Local purge failed");
                    (
                        StepOutcome::Failed {
                            error: e.to_string(),
                        },
                        0,
                    )
                }
            }
        } else {
            (StepOutcome::NotRequested, 0)
        };

        self.session.close()?;
        info!(user = %user, "Logged out");

        Ok(LogoutReport {
            user,
            remote_delete,
            local_purge,
            purged,
        })
    }

    /// Local counts and session flags.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if counting fails.
    pub async fn status(&self) -> Result<SyncStatus> {
        let session = self.session.snapshot();
        let user = session.current_user().map(str::to_string);
        let total_records = self.local.count().await?;
        let local_records = match &user {
            Some(u) => self.local.count_for_owner(u).await?,
            None => 0,
        };

        Ok(SyncStatus {
            switch_pending: session.is_user_switch(),
            last_user: Some(session.last_username).filter(|u| !u.is_empty()),
            user,
            local_records,
            foreign_records: total_records.saturating_sub(local_records),
            total_records,
            syncing: self.is_syncing(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::identity::StaticIdentity;
    use crate::model::{Record, Session};
    use crate::remote::MemoryRemoteStore;
    use crate::storage::SqliteStorage;

    type Engine = SyncEngine<SqliteStorage, MemoryRemoteStore>;

    fn engine_for(user: &str) -> Engine {
        let session = SessionContext::new();
        session.login(user).unwrap();
        engine_with(session, SyncConfig::default())
    }

    fn engine_with(session: SessionContext, config: SyncConfig) -> Engine {
        SyncEngine::new(
            Arc::new(SqliteStorage::open_memory().unwrap()),
            Arc::new(MemoryRemoteStore::new()),
            Arc::new(session),
            Arc::new(StaticIdentity("device-1".into())),
            config,
        )
    }

    /// SQLite-backed store with switches that make inserts or purges fail.
    struct FlakyStore {
        inner: SqliteStorage,
        fail_insert: AtomicBool,
        fail_purge: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: SqliteStorage::open_memory().unwrap(),
                fail_insert: AtomicBool::new(false),
                fail_purge: AtomicBool::new(false),
            }
        }
    }

    impl LocalStore for FlakyStore {
        async fn insert(&self, record: &Record, owner: &str) -> Result<LocalRecord> {
            self.inner.insert(record, owner).await
        }

        async fn insert_many(&self, records: &[Record], owner: &str) -> Result<usize> {
            if self.fail_insert.load(Ordering::SeqCst) {
                return Err(Error::Database(rusqlite::Error::InvalidQuery));
            }
            self.inner.insert_many(records, owner).await
        }

        async fn list_all(&self) -> Result<Vec<LocalRecord>> {
            self.inner.list_all().await
        }

        async fn list_for_owner(&self, owner: &str) -> Result<Vec<LocalRecord>> {
            self.inner.list_for_owner(owner).await
        }

        async fn count(&self) -> Result<u64> {
            self.inner.count().await
        }

        async fn count_for_owner(&self, owner: &str) -> Result<u64> {
            self.inner.count_for_owner(owner).await
        }

        async fn delete_all(&self) -> Result<usize> {
            self.inner.delete_all().await
        }

        async fn delete_all_except_owner(&self, owner: &str) -> Result<usize> {
            if self.fail_purge.load(Ordering::SeqCst) {
                return Err(Error::Database(rusqlite::Error::InvalidQuery));
            }
            self.inner.delete_all_except_owner(owner).await
        }
    }

    fn flaky_engine(session: SessionContext) -> SyncEngine<FlakyStore, MemoryRemoteStore> {
        SyncEngine::new(
            Arc::new(FlakyStore::new()),
            Arc::new(MemoryRemoteStore::new()),
            Arc::new(session),
            Arc::new(StaticIdentity("device-1".into())),
            SyncConfig::default(),
        )
    }

    fn rec(tag: &str, note: &str) -> Record {
        Record::new(tag, 10.5, -75.2, note)
    }

    fn bundle(user: &str, records: Vec<Record>) -> RemoteBundle {
        RemoteBundle {
            records,
            owner: user.into(),
            ..RemoteBundle::default()
        }
    }

    async fn local_tags(engine: &Engine, user: &str) -> Vec<String> {
        engine
            .local()
            .list_for_owner(user)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.record.tag)
            .collect()
    }

    #[tokio::test]
    async fn test_pull_adds_remote_only_and_keeps_local_content() {
        let engine = engine_for("alice");
        engine.local().insert(&rec("A", "a"), "alice").await.unwrap();
        engine.local().insert(&rec("B", "local"), "alice").await.unwrap();
        engine
            .remote()
            .put_bundle("alice", &bundle("alice", vec![rec("B", "remote"), rec("C", "c")]))
            .unwrap();

        let stats = engine.pull_and_merge("alice").await.unwrap();
        assert_eq!(stats.added, 1);
        assert_eq!(stats.conflicts, 1);

        let rows = engine.local().list_for_owner("alice").await.unwrap();
        let tags: Vec<_> = rows.iter().map(LocalRecord::tag).collect();
        assert_eq!(tags, vec!["A", "B", "C"]);
        assert_eq!(rows[1].record.note, "local");
    }

    #[tokio::test]
    async fn test_pull_twice_is_idempotent() {
        let engine = engine_for("alice");
        engine
            .remote()
            .put_bundle("alice", &bundle("alice", vec![rec("A", ""), rec("B", "")]))
            .unwrap();

        engine.pull_and_merge("alice").await.unwrap();
        let second = engine.pull_and_merge("alice").await.unwrap();

        assert_eq!(second.added, 0);
        assert_eq!(local_tags(&engine, "alice").await, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_invalid_remote_record_does_not_block_sync() {
        let engine = engine_for("alice");
        engine.local().insert(&rec("L", ""), "alice").await.unwrap();
        let bad = Record::new("BAD", 95.0, 1.0, "");
        engine
            .remote()
            .put_bundle("alice", &bundle("alice", vec![rec("GOOD", ""), bad]))
            .unwrap();

        for _ in 0..2 {
            engine.sync_all("alice").await.unwrap().completed().unwrap();
        }

        assert_eq!(local_tags(&engine, "alice").await, vec!["L", "GOOD"]);
        let stored = engine.remote().get_bundle("alice").await.unwrap().unwrap();
        let tags: Vec<_> = stored.records.iter().map(|r| r.tag.as_str()).collect();
        assert!(tags.contains(&"L"));
        assert!(tags.contains(&"GOOD"));

        let again = engine.pull_and_merge("alice").await.unwrap();
        assert_eq!(again.added, 0);
        assert_eq!(again.invalid, 1);
    }

    #[tokio::test]
    async fn test_pull_insert_failure_is_persistence_error() {
        let session = SessionContext::new();
        session.login("alice").unwrap();
        let engine = flaky_engine(session);
        engine
            .remote()
            .put_bundle("alice", &bundle("alice", vec![rec("R", "")]))
            .unwrap();
        engine.local().fail_insert.store(true, Ordering::SeqCst);

        let err = engine.pull_and_merge("alice").await.unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        assert_eq!(engine.local().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pull_without_bundle_is_empty() {
        let engine = engine_for("alice");
        let stats = engine.pull_and_merge("alice").await.unwrap();
        assert_eq!(stats, MergeStats::default());
    }

    #[tokio::test]
    async fn test_push_with_no_local_records_is_noop() {
        let engine = engine_for("alice");
        let report = engine.push("alice").await.unwrap();
        assert!(report.noop);
        assert_eq!(engine.remote().write_count(), 0);
        assert_eq!(engine.remote().get_count(), 0);
    }

    #[tokio::test]
    async fn test_push_writes_union_with_metadata() {
        let engine = engine_for("alice");
        engine.local().insert(&rec("A", "a"), "alice").await.unwrap();
        engine.local().insert(&rec("A", "again"), "alice").await.unwrap();
        engine
            .remote()
            .put_bundle("alice", &bundle("alice", vec![rec("Z", "other device")]))
            .unwrap();

        let report = engine.push("alice").await.unwrap();
        assert_eq!(report.written, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.remote_only, 1);

        let stored = engine.remote().get_bundle("alice").await.unwrap().unwrap();
        let tags: Vec<_> = stored.records.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["A", "Z"]);
        assert_eq!(stored.records[0].note, "a");
        assert_eq!(stored.owner, "alice");
        assert_eq!(stored.device_id.as_deref(), Some("device-1"));
        assert!(stored.synced_at.is_some());
        assert!(stored.server_timestamp > 0);
    }

    #[tokio::test]
    async fn test_push_does_not_touch_other_users() {
        let engine = engine_for("alice");
        engine.local().insert(&rec("A", ""), "alice").await.unwrap();
        engine.local().insert(&rec("B", ""), "bob").await.unwrap();

        engine.push("alice").await.unwrap();
        let stored = engine.remote().get_bundle("alice").await.unwrap().unwrap();
        assert_eq!(stored.records.len(), 1);
        assert!(engine.remote().raw("bob").is_none());
    }

    #[tokio::test]
    async fn test_sync_all_pulls_then_pushes() {
        let engine = engine_for("alice");
        engine.local().insert(&rec("A", ""), "alice").await.unwrap();
        engine
            .remote()
            .put_bundle("alice", &bundle("alice", vec![rec("C", "")]))
            .unwrap();

        let report = engine.sync_all("alice").await.unwrap().completed().unwrap();
        assert_eq!(report.pulled.added, 1);
        assert_eq!(report.pushed.written, 2);
        assert_eq!(local_tags(&engine, "alice").await, vec!["A", "C"]);
        assert!(!engine.is_syncing());
    }

    #[tokio::test]
    async fn test_pull_failure_skips_push() {
        let engine = engine_for("alice");
        engine.local().insert(&rec("A", ""), "alice").await.unwrap();
        engine.remote().set_fail_get(true);

        let err = engine.sync_all("alice").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(engine.remote().write_count(), 0);
        assert!(!engine.is_syncing());
        assert_eq!(engine.local().count().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_sync_all_runs_once() {
        let engine = engine_for("alice");
        engine.local().insert(&rec("A", ""), "alice").await.unwrap();
        engine.remote().set_delay(Duration::from_millis(100));

        let (first, second) = tokio::join!(engine.sync_all("alice"), engine.sync_all("alice"));
        let outcomes = [first.unwrap(), second.unwrap()];

        assert_eq!(outcomes.iter().filter(|o| o.is_completed()).count(), 1);
        assert_eq!(engine.remote().write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_timeout() {
        let engine = engine_for("alice");
        engine.local().insert(&rec("A", ""), "alice").await.unwrap();
        engine.remote().set_delay(Duration::from_secs(60));

        let err = engine.push("alice").await.unwrap_err();
        assert!(matches!(err, Error::SyncTimeout { phase: "push", .. }));
        assert_eq!(engine.local().count().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_all_overall_timeout_releases_guard() {
        let session = SessionContext::new();
        session.login("alice").unwrap();
        let config = SyncConfig {
            push_timeout: Duration::from_secs(15),
            sync_timeout: Duration::from_secs(20),
            sync_every: 1,
        };
        let engine = engine_with(session, config);
        engine.local().insert(&rec("A", ""), "alice").await.unwrap();
        // Pull takes 12s, then push would take 24s: only the overall bound fires.
        engine.remote().set_delay(Duration::from_secs(12));

        let err = engine.sync_all("alice").await.unwrap_err();
        assert!(matches!(err, Error::SyncTimeout { phase: "sync", .. }));
        assert!(!engine.is_syncing());
    }

    #[tokio::test]
    async fn test_user_switch_purges_other_owners() {
        let session = SessionContext::from_session(Session {
            username: "bob".into(),
            last_username: "alice".into(),
            logged_in: true,
        });
        let engine = engine_with(session, SyncConfig::default());
        engine.local().insert(&rec("A", ""), "alice").await.unwrap();
        engine.local().insert(&rec("B", ""), "bob").await.unwrap();

        let cleanup = engine.reconcile_user_switch().await;
        assert!(cleanup.switched);
        assert_eq!(cleanup.outcome, StepOutcome::Succeeded);
        assert_eq!(cleanup.purged, 1);

        let all = engine.local().list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].owner, "bob");
        assert!(!engine.session().user_switch());
        assert_eq!(engine.session().snapshot().last_username, "bob");
    }

    #[tokio::test]
    async fn test_failed_purge_keeps_switch_pending_and_resume_continues() {
        let engine = flaky_engine(SessionContext::from_session(Session {
            username: "bob".into(),
            last_username: "alice".into(),
            logged_in: true,
        }));
        engine.local().insert(&rec("A", ""), "alice").await.unwrap();
        engine.local().insert(&rec("B", ""), "bob").await.unwrap();
        engine
            .remote()
            .put_bundle("bob", &bundle("bob", vec![rec("R", "")]))
            .unwrap();
        engine.local().fail_purge.store(true, Ordering::SeqCst);

        let report = engine.resume().await.unwrap();
        assert!(report.cleanup.switched);
        assert!(report.cleanup.outcome.is_failed());
        assert_eq!(report.cleanup.purged, 0);
        assert!(engine.session().user_switch());
        assert_eq!(engine.session().snapshot().last_username, "alice");

        assert_eq!(report.sync, StepOutcome::Succeeded);
        let tags: Vec<_> = report.records.iter().map(LocalRecord::tag).collect();
        assert_eq!(tags, vec!["B", "R"]);

        // Cleanup is retried once the store recovers.
        engine.local().fail_purge.store(false, Ordering::SeqCst);
        let cleanup = engine.reconcile_user_switch().await;
        assert_eq!(cleanup.outcome, StepOutcome::Succeeded);
        assert_eq!(cleanup.purged, 1);
        assert!(!engine.session().user_switch());
    }

    #[tokio::test]
    async fn test_no_switch_keeps_everything() {
        let engine = engine_for("alice");
        engine.local().insert(&rec("B", ""), "bob").await.unwrap();

        let cleanup = engine.reconcile_user_switch().await;
        assert!(!cleanup.switched);
        assert_eq!(engine.local().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_resume_records_sync_failure_and_still_loads() {
        let engine = engine_for("alice");
        engine.local().insert(&rec("A", ""), "alice").await.unwrap();
        engine.remote().set_fail_get(true);

        let report = engine.resume().await.unwrap();
        assert!(report.sync.is_failed());
        assert!(report.sync_report.is_none());
        assert_eq!(report.records.len(), 1);
    }

    #[tokio::test]
    async fn test_resume_after_switch() {
        let session = SessionContext::new();
        session.login("alice").unwrap();
        session.close().unwrap();
        session.login("bob").unwrap();

        let engine = engine_with(session, SyncConfig::default());
        engine.local().insert(&rec("A", ""), "alice").await.unwrap();
        engine
            .remote()
            .put_bundle("bob", &bundle("bob", vec![rec("R", "")]))
            .unwrap();

        let report = engine.resume().await.unwrap();
        assert!(report.cleanup.switched);
        assert_eq!(report.sync, StepOutcome::Succeeded);
        let tags: Vec<_> = report.records.iter().map(LocalRecord::tag).collect();
        assert_eq!(tags, vec!["R"]);
        assert_eq!(engine.local().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_resume_requires_user() {
        let engine = engine_with(SessionContext::new(), SyncConfig::default());
        assert!(matches!(engine.resume().await, Err(Error::NoActiveUser)));
    }

    #[tokio::test]
    async fn test_logout_partial_success() {
        let engine = engine_for("alice");
        engine.local().insert(&rec("A", ""), "alice").await.unwrap();
        engine
            .remote()
            .put_bundle("alice", &bundle("alice", vec![rec("A", "")]))
            .unwrap();
        engine.remote().set_fail_delete(true);

        let report = engine
            .logout(LogoutOptions {
                delete_remote: true,
                purge_local: true,
            })
            .await
            .unwrap();

        assert!(report.remote_delete.is_failed());
        assert_eq!(report.local_purge, StepOutcome::Succeeded);
        assert_eq!(report.purged, 1);
        assert!(report.is_partial());
        assert!(!report.is_complete());
        assert!(engine.remote().raw("alice").is_some());

        let session = engine.session().snapshot();
        assert!(!session.logged_in);
        assert_eq!(session.last_username, "alice");
    }

    #[tokio::test]
    async fn test_plain_logout_keeps_data() {
        let engine = engine_for("alice");
        engine.local().insert(&rec("A", ""), "alice").await.unwrap();

        let report = engine.logout(LogoutOptions::default()).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.remote_delete, StepOutcome::NotRequested);
        assert_eq!(engine.local().count().await.unwrap(), 1);
        assert_eq!(engine.session().current_user(), None);
    }

    #[tokio::test]
    async fn test_status_counts() {
        let engine = engine_for("alice");
        engine.local().insert(&rec("A", ""), "alice").await.unwrap();
        engine.local().insert(&rec("B", ""), "bob").await.unwrap();
        engine.local().insert(&rec("C", ""), "bob").await.unwrap();

        let status = engine.status().await.unwrap();
        assert_eq!(status.user.as_deref(), Some("alice"));
        assert_eq!(status.local_records, 1);
        assert_eq!(status.foreign_records, 2);
        assert_eq!(status.total_records, 3);
        assert!(!status.syncing);
    }
}
