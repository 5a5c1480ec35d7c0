//! Remote store trait.
//!
//! Defines the interface that all remote bundle stores must implement.
//! Uses async methods for HTTP-based stores.

use std::future::Future;

use crate::error::Result;
use crate::model::RemoteBundle;

/// Document-oriented remote storage, one bundle per user.
///
/// Implemented by [`HttpRemoteStore`](super::HttpRemoteStore) and the
/// in-process [`MemoryRemoteStore`](super::MemoryRemoteStore).
pub trait RemoteStore: Send + Sync {
    /// Fetch the user's bundle. `Ok(None)` when the user has none yet.
    fn get_bundle(&self, user: &str)
    -> impl Future<Output = Result<Option<RemoteBundle>>> + Send;

    /// Merge the bundle's top-level fields into the stored document.
    ///
    /// Fields the bundle does not carry are left as they are; the stored
    /// document is never replaced wholesale.
    fn merge_write_bundle(
        &self,
        user: &str,
        bundle: &RemoteBundle,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete the user's bundle. Deleting a missing bundle succeeds.
    fn delete_bundle(&self, user: &str) -> impl Future<Output = Result<()>> + Send;
}
