//! User settings file.
//!
//! Stored at `~/.fieldsync/config.json`. Every field is optional; a missing
//! file means all defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sync::{DEFAULT_PUSH_TIMEOUT, DEFAULT_SYNC_EVERY, DEFAULT_SYNC_TIMEOUT, SyncConfig};

/// Env var overriding `remote_url`.
pub const REMOTE_URL_ENV: &str = "FIELDSYNC_REMOTE_URL";

/// Env var overriding `verify_url`.
pub const VERIFY_URL_ENV: &str = "FIELDSYNC_VERIFY_URL";

/// Contents of `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the bundle document service.
    pub remote_url: Option<String>,
    /// Bearer token for the document service.
    pub remote_token: Option<String>,
    /// Verification service endpoint. Offline verification when unset.
    pub verify_url: Option<String>,
    /// Push after every N-th captured record; 0 disables.
    pub sync_every: u32,
    pub push_timeout_secs: u64,
    pub sync_timeout_secs: u64,
    /// Fixed device id, ahead of the machine-derived one.
    pub device_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            remote_url: None,
            remote_token: None,
            verify_url: None,
            sync_every: DEFAULT_SYNC_EVERY,
            push_timeout_secs: DEFAULT_PUSH_TIMEOUT.as_secs(),
            sync_timeout_secs: DEFAULT_SYNC_TIMEOUT.as_secs(),
            device_id: None,
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read or parsed, or
    /// holds invalid values.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;
        let settings: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply env overrides through `lookup` (normally `std::env::var`).
    /// Empty values are ignored.
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(REMOTE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.remote_url = Some(url);
        }
        if let Some(url) = lookup(VERIFY_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.verify_url = Some(url);
        }
        self
    }

    /// Apply overrides from the process environment.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Reject values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for zero timeouts.
    pub fn validate(&self) -> Result<()> {
        if self.push_timeout_secs == 0 {
            return Err(Error::Config("push_timeout_secs must be greater than 0".into()));
        }
        if self.sync_timeout_secs == 0 {
            return Err(Error::Config("sync_timeout_secs must be greater than 0".into()));
        }
        Ok(())
    }

    /// Engine settings derived from this file.
    #[must_use]
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            push_timeout: Duration::from_secs(self.push_timeout_secs),
            sync_timeout: Duration::from_secs(self.sync_timeout_secs),
            sync_every: self.sync_every,
        }
    }
}
