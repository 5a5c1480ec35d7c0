//! Local store contract.
//!
//! The sync engine and ingestion pipeline only talk to the local database
//! through this trait, so tests and alternative backends can stand in for
//! [`SqliteStorage`](super::SqliteStorage).

use std::future::Future;

use crate::error::Result;
use crate::model::{LocalRecord, Record};

/// CRUD over locally persisted records, scoped by owning user.
///
/// Duplicate tags may coexist locally; deduplication happens when bundles
/// are built. Every mutation is atomic.
pub trait LocalStore: Send + Sync {
    /// Persist one record for `owner`.
    fn insert(&self, record: &Record, owner: &str)
    -> impl Future<Output = Result<LocalRecord>> + Send;

    /// Persist several records for `owner` in one transaction.
    ///
    /// Default implementation calls `insert` for each record.
    fn insert_many(
        &self,
        records: &[Record],
        owner: &str,
    ) -> impl Future<Output = Result<usize>> + Send {
        async move {
            for record in records {
                self.insert(record, owner).await?;
            }
            Ok(records.len())
        }
    }

    /// Every row, in insertion order.
    fn list_all(&self) -> impl Future<Output = Result<Vec<LocalRecord>>> + Send;

    /// Rows owned by `owner`, in insertion order.
    fn list_for_owner(&self, owner: &str) -> impl Future<Output = Result<Vec<LocalRecord>>> + Send;

    /// Total row count.
    fn count(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Row count for one owner.
    fn count_for_owner(&self, owner: &str) -> impl Future<Output = Result<u64>> + Send;

    /// Delete every row. Returns the number deleted.
    fn delete_all(&self) -> impl Future<Output = Result<usize>> + Send;

    /// Delete every row not owned by `owner`. Returns the number deleted.
    fn delete_all_except_owner(&self, owner: &str) -> impl Future<Output = Result<usize>> + Send;
}
