//! Shared wiring for commands: paths, settings, stores and the runtime.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{SessionFile, Settings, load_settings, resolve_db_path, session_path};
use crate::error::{Error, Result};
use crate::identity::FallbackIdentity;
use crate::ingest::{IngestPipeline, create_verifier};
use crate::model::SessionContext;
use crate::remote::HttpRemoteStore;
use crate::storage::SqliteStorage;
use crate::sync::SyncEngine;

/// Engine as wired by the CLI.
pub type Engine = SyncEngine<SqliteStorage, HttpRemoteStore>;

/// Everything a command needs.
pub struct App {
    pub settings: Settings,
    pub engine: Engine,
}

impl App {
    /// Open the database and session.
    ///
    /// With `create` unset a missing database is `NotInitialized`; only
    /// `login` creates it.
    ///
    /// # Errors
    ///
    /// Returns a config, session-file or database error.
    pub fn open(db_path: Option<&PathBuf>, create: bool) -> Result<Self> {
        let db_path = resolve_db_path(db_path.map(PathBuf::as_path))
            .ok_or_else(|| Error::Config("Could not determine database path".into()))?;
        if !create && !db_path.exists() {
            return Err(Error::NotInitialized { path: db_path });
        }

        let settings = load_settings()?;
        let storage = SqliteStorage::open(&db_path)?;
        let session = SessionContext::load(SessionFile::new(session_path()?))?;
        let remote = HttpRemoteStore::new(settings.remote_url.clone(), settings.remote_token.clone());
        let identity = FallbackIdentity::new(settings.device_id.clone());

        let engine = SyncEngine::new(
            Arc::new(storage),
            Arc::new(remote),
            Arc::new(session),
            Arc::new(identity),
            settings.sync_config(),
        );
        Ok(Self { settings, engine })
    }

    /// Ingestion pipeline over this app's engine.
    #[must_use]
    pub fn pipeline(&self) -> IngestPipeline<SqliteStorage, HttpRemoteStore> {
        let verifier = create_verifier(self.settings.verify_url.as_deref());
        IngestPipeline::new(self.engine.clone(), verifier)
    }
}

/// Drive an async command to completion.
///
/// # Errors
///
/// Returns `Error::Other` if the runtime cannot be created.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;
    Ok(rt.block_on(future))
}

/// Print a serializable value as one JSON line.
///
/// # Errors
///
/// Returns `Error::Json` if serialization fails.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
