//! In-process remote store.
//!
//! Keeps one JSON document per user in memory and applies the same
//! field-level merge a document database does. Failure switches and an
//! artificial latency let tests drive the sync engine through transport
//! failures and timeouts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::model::RemoteBundle;

use super::store::RemoteStore;

type Document = Map<String, Value>;

/// In-memory [`RemoteStore`].
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    docs: Mutex<HashMap<String, Document>>,
    fail_get: AtomicBool,
    fail_write: AtomicBool,
    fail_delete: AtomicBool,
    delay_ms: AtomicU64,
    get_count: AtomicUsize,
    write_count: AtomicUsize,
    delete_count: AtomicUsize,
}

impl MemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `get_bundle` fail with a transport error.
    pub fn set_fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    /// Make every `merge_write_bundle` fail with a transport error.
    pub fn set_fail_write(&self, fail: bool) {
        self.fail_write.store(fail, Ordering::SeqCst);
    }

    /// Make every `delete_bundle` fail with a transport error.
    pub fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Add latency in front of every operation.
    pub fn set_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Store a raw document for `user`, replacing any existing one.
    pub fn put_raw(&self, user: &str, document: Document) {
        self.docs().insert(user.to_string(), document);
    }

    /// Store a bundle for `user`, replacing any existing document.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundle cannot be serialized.
    pub fn put_bundle(&self, user: &str, bundle: &RemoteBundle) -> Result<()> {
        self.put_raw(user, bundle.to_fields()?);
        Ok(())
    }

    /// The raw stored document for `user`.
    #[must_use]
    pub fn raw(&self, user: &str) -> Option<Document> {
        self.docs().get(user).cloned()
    }

    #[must_use]
    pub fn get_count(&self) -> usize {
        self.get_count.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.delete_count.load(Ordering::SeqCst)
    }

    async fn latency(&self) {
        let millis = self.delay_ms.load(Ordering::SeqCst);
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }

    fn docs(&self) -> MutexGuard<'_, HashMap<String, Document>> {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RemoteStore for MemoryRemoteStore {
    async fn get_bundle(&self, user: &str) -> Result<Option<RemoteBundle>> {
        self.get_count.fetch_add(1, Ordering::SeqCst);
        self.latency().await;
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(Error::Transport("remote unavailable".to_string()));
        }

        let document = self.docs().get(user).cloned();
        match document {
            Some(doc) => Ok(Some(serde_json::from_value(Value::Object(doc))?)),
            None => Ok(None),
        }
    }

    async fn merge_write_bundle(&self, user: &str, bundle: &RemoteBundle) -> Result<()> {
        self.write_count.fetch_add(1, Ordering::SeqCst);
        self.latency().await;
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(Error::Transport("remote unavailable".to_string()));
        }

        let fields = bundle.to_fields()?;
        self.docs()
            .entry(user.to_string())
            .or_default()
            .extend(fields);
        Ok(())
    }

    async fn delete_bundle(&self, user: &str) -> Result<()> {
        self.delete_count.fetch_add(1, Ordering::SeqCst);
        self.latency().await;
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Error::Transport("remote unavailable".to_string()));
        }

        self.docs().remove(user);
        Ok(())
    }
}
