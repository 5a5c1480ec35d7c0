//! SQLite storage implementation.
//!
//! This module provides the local record store using SQLite.
//! It follows the MutationContext pattern for transaction discipline and audit logging.

use crate::error::Result;
use crate::model::{LocalRecord, Record};
use crate::storage::events::{Event, EventType, insert_event};
use crate::storage::local::LocalStore;
use crate::storage::schema::apply_schema;
use rusqlite::{Connection, Row, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Actor recorded for mutations not tied to a user.
const SYSTEM_ACTOR: &str = "fieldsync";

/// SQLite-based storage backend.
///
/// The connection sits behind a mutex so one handle can be shared between
/// the ingestion pipeline and background sync tasks.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

/// Context for a mutation operation, tracking side effects.
///
/// This struct is passed to mutation closures to record audit events,
/// which are written in the same transaction as the mutation itself.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Actor performing the operation (usually the owning username).
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event with old/new values for change tracking.
    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor)
                .with_values(old_value, new_value)
                .with_comment(&self.op_name),
        );
    }
}

/// Row counts per owner, for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct OwnerCount {
    pub owner: String,
    pub records: u64,
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Default 5 second timeout
        let timeout = timeout_ms.map_or(Duration::from_secs(5), Duration::from_millis);
        conn.busy_timeout(timeout)?;

        apply_schema(&conn)?;
        debug!(path = %path.display(), "Opened local store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the underlying connection (for read operations).
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Writes audit events
    /// 4. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);

        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;

        Ok(result)
    }

    // ==================
    // Record Operations
    // ==================

    /// Insert records for `owner` in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; nothing is written in that case.
    pub fn insert_records(&self, records: &[Record], owner: &str) -> Result<Vec<LocalRecord>> {
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("insert_records", owner, |tx, ctx| {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO records (tag, latitude, longitude, note, owner, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;

            let mut inserted = Vec::with_capacity(records.len());
            for record in records {
                stmt.execute(rusqlite::params![
                    record.tag,
                    record.latitude,
                    record.longitude,
                    record.note,
                    owner,
                    now
                ])?;
                let id = tx.last_insert_rowid();
                ctx.record_change(
                    "record",
                    &id.to_string(),
                    EventType::RecordInserted,
                    None,
                    Some(record.tag.clone()),
                );
                inserted.push(LocalRecord {
                    id,
                    owner: owner.to_string(),
                    record: record.clone(),
                    created_at: now,
                });
            }
            Ok(inserted)
        })
    }

    /// List records, optionally restricted to one owner, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_records(&self, owner: Option<&str>) -> Result<Vec<LocalRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, tag, latitude, longitude, note, owner, created_at
             FROM records
             WHERE ?1 IS NULL OR owner = ?1
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map([owner], map_record)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Into::into)
    }

    /// Count records, optionally restricted to one owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_records(&self, owner: Option<&str>) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM records WHERE ?1 IS NULL OR owner = ?1",
            [owner],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Row counts grouped by owner, largest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn owner_counts(&self) -> Result<Vec<OwnerCount>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT owner, COUNT(*) FROM records GROUP BY owner ORDER BY COUNT(*) DESC, owner ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let records: i64 = row.get(1)?;
            Ok(OwnerCount {
                owner: row.get(0)?,
                records: u64::try_from(records).unwrap_or_default(),
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Into::into)
    }

    /// Delete every record.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_all_records(&self) -> Result<usize> {
        let deleted = self.mutate("delete_all_records", SYSTEM_ACTOR, |tx, ctx| {
            let deleted = tx.execute("DELETE FROM records", [])?;
            ctx.record_change(
                "records",
                "*",
                EventType::RecordsCleared,
                Some(deleted.to_string()),
                Some("0".to_string()),
            );
            Ok(deleted)
        })?;
        info!(deleted, "Cleared local records");
        Ok(deleted)
    }

    /// Delete every record not owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_records_except_owner(&self, owner: &str) -> Result<usize> {
        let deleted = self.mutate("delete_records_except_owner", owner, |tx, ctx| {
            let deleted = tx.execute("DELETE FROM records WHERE owner != ?1", [owner])?;
            ctx.record_change(
                "owner",
                owner,
                EventType::RecordsPurged,
                Some(deleted.to_string()),
                None,
            );
            Ok(deleted)
        })?;
        info!(user = %owner, deleted, "Purged records of other users");
        Ok(deleted)
    }
}

fn map_record(row: &Row<'_>) -> rusqlite::Result<LocalRecord> {
    Ok(LocalRecord {
        id: row.get(0)?,
        record: Record {
            tag: row.get(1)?,
            latitude: row.get(2)?,
            longitude: row.get(3)?,
            note: row.get(4)?,
        },
        owner: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl LocalStore for SqliteStorage {
    async fn insert(&self, record: &Record, owner: &str) -> Result<LocalRecord> {
        let mut inserted = self.insert_records(std::slice::from_ref(record), owner)?;
        inserted
            .pop()
            .ok_or_else(|| crate::Error::Persistence("insert returned no row".to_string()))
    }

    async fn insert_many(&self, records: &[Record], owner: &str) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        Ok(self.insert_records(records, owner)?.len())
    }

    async fn list_all(&self) -> Result<Vec<LocalRecord>> {
        self.list_records(None)
    }

    async fn list_for_owner(&self, owner: &str) -> Result<Vec<LocalRecord>> {
        self.list_records(Some(owner))
    }

    async fn count(&self) -> Result<u64> {
        self.count_records(None)
    }

    async fn count_for_owner(&self, owner: &str) -> Result<u64> {
        self.count_records(Some(owner))
    }

    async fn delete_all(&self) -> Result<usize> {
        self.delete_all_records()
    }

    async fn delete_all_except_owner(&self, owner: &str) -> Result<usize> {
        self.delete_records_except_owner(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::events::get_events;

    fn rec(tag: &str) -> Record {
        Record::new(tag, 1.0, 2.0, format!("note {tag}"))
    }

    #[tokio::test]
    async fn test_insert_and_list_in_order() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage.insert(&rec("A"), "alice").await.unwrap();
        storage.insert(&rec("B"), "alice").await.unwrap();
        storage.insert(&rec("C"), "bob").await.unwrap();

        let alice = storage.list_for_owner("alice").await.unwrap();
        let tags: Vec<_> = alice.iter().map(LocalRecord::tag).collect();
        assert_eq!(tags, vec!["A", "B"]);
        assert!(alice[0].id < alice[1].id);

        assert_eq!(storage.list_all().await.unwrap().len(), 3);
        assert_eq!(storage.count().await.unwrap(), 3);
        assert_eq!(storage.count_for_owner("bob").await.unwrap(), 1);
        assert_eq!(storage.count_for_owner("nobody").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_tags_coexist() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage.insert(&rec("A"), "alice").await.unwrap();
        storage.insert(&rec("A"), "alice").await.unwrap();
        assert_eq!(storage.count_for_owner("alice").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_insert_many_is_atomic() {
        let storage = SqliteStorage::open_memory().unwrap();
        let bad = vec![rec("A"), Record::new("B", 120.0, 0.0, "")];

        assert!(storage.insert_many(&bad, "alice").await.is_err());
        assert_eq!(storage.count().await.unwrap(), 0);

        let good = vec![rec("A"), rec("B")];
        assert_eq!(storage.insert_many(&good, "alice").await.unwrap(), 2);
        assert_eq!(storage.insert_many(&[], "alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_all_except_owner() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage.insert(&rec("A"), "alice").await.unwrap();
        storage.insert(&rec("B"), "bob").await.unwrap();
        storage.insert(&rec("C"), "carol").await.unwrap();

        let deleted = storage.delete_all_except_owner("bob").await.unwrap();
        assert_eq!(deleted, 2);

        let rest = storage.list_all().await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].owner, "bob");

        let events = get_events(&storage.conn(), "owner", "bob", None).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::RecordsPurged);
        assert_eq!(events[0].old_value.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_delete_all() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage.insert(&rec("A"), "alice").await.unwrap();
        storage.insert(&rec("B"), "bob").await.unwrap();

        assert_eq!(storage.delete_all().await.unwrap(), 2);
        assert_eq!(storage.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_writes_audit_event() {
        let storage = SqliteStorage::open_memory().unwrap();
        let local = storage.insert(&rec("A"), "alice").await.unwrap();

        let events = get_events(&storage.conn(), "record", &local.id.to_string(), None).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor, "alice");
        assert_eq!(events[0].new_value.as_deref(), Some("A"));
    }

    #[test]
    fn test_owner_counts() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage
            .insert_records(&[rec("A"), rec("B")], "alice")
            .unwrap();
        storage.insert_records(&[rec("C")], "bob").unwrap();

        let counts = storage.owner_counts().unwrap();
        assert_eq!(
            counts,
            vec![
                OwnerCount {
                    owner: "alice".into(),
                    records: 2
                },
                OwnerCount {
                    owner: "bob".into(),
                    records: 1
                },
            ]
        );
    }

    #[test]
    fn test_open_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data").join("fieldsync.db");

        let storage = SqliteStorage::open(&path).unwrap();
        storage.insert_records(&[rec("A")], "alice").unwrap();
        drop(storage);

        let reopened = SqliteStorage::open(&path).unwrap();
        assert_eq!(reopened.count_records(None).unwrap(), 1);
    }
}
