//! Session state.
//!
//! The session tracks who is capturing records on this device. A *user
//! switch* happens when the current username differs from the last one
//! whose data was left on the device; the sync engine reacts to it by
//! purging the previous user's local rows.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SessionFile;
use crate::error::{Error, Result};

/// Process-wide session flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Username of the current (or most recent) login.
    #[serde(default)]
    pub username: String,

    /// Username whose data is known to be the only data on this device.
    #[serde(default)]
    pub last_username: String,

    #[serde(default)]
    pub logged_in: bool,
}

impl Session {
    /// True when both names are known and differ.
    #[must_use]
    pub fn is_user_switch(&self) -> bool {
        !self.username.is_empty()
            && !self.last_username.is_empty()
            && self.username != self.last_username
    }

    /// The logged-in username, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<&str> {
        (self.logged_in && !self.username.is_empty()).then_some(self.username.as_str())
    }
}

/// Shared, independently synchronized session handle.
///
/// Every mutation is written through to the backing [`SessionFile`] when
/// one is attached, so a switch is still detected after a restart.
#[derive(Debug, Default)]
pub struct SessionContext {
    state: RwLock<Session>,
    file: Option<SessionFile>,
}

impl SessionContext {
    /// In-memory session starting logged out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory session with the given initial state.
    #[must_use]
    pub fn from_session(session: Session) -> Self {
        Self {
            state: RwLock::new(session),
            file: None,
        }
    }

    /// Load the session from a file, attaching it for write-through.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(file: SessionFile) -> Result<Self> {
        let session = file.load()?;
        debug!(path = %file.path().display(), user = %session.username, "Loaded session");
        Ok(Self {
            state: RwLock::new(session),
            file: Some(file),
        })
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.read().clone()
    }

    /// The logged-in username, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<String> {
        self.read().current_user().map(str::to_string)
    }

    /// The logged-in username, or `NoActiveUser`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoActiveUser` when nobody is logged in.
    pub fn require_user(&self) -> Result<String> {
        self.current_user().ok_or(Error::NoActiveUser)
    }

    /// Whether the current user differs from the last known one.
    #[must_use]
    pub fn user_switch(&self) -> bool {
        self.read().is_user_switch()
    }

    /// Start a session for `username`.
    ///
    /// Logging in over another user's open session closes it first, so the
    /// switch is still detected.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty username or if persisting fails.
    pub fn login(&self, username: &str) -> Result<()> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::InvalidInputFormat("username is required".to_string()));
        }
        self.update(|s| {
            if s.logged_in && !s.username.is_empty() && s.username != username {
                s.last_username.clone_from(&s.username);
            }
            s.username = username.to_string();
            s.logged_in = true;
        })?;
        info!(user = %username, "Logged in");
        Ok(())
    }

    /// End the session: remember the user as last-known and log out.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting fails.
    pub fn close(&self) -> Result<()> {
        self.update(|s| {
            s.last_username.clone_from(&s.username);
            s.logged_in = false;
        })
    }

    /// Record that only the current user's data remains on the device.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting fails.
    pub fn mark_cleaned(&self) -> Result<()> {
        self.update(|s| s.last_username.clone_from(&s.username))
    }

    fn update(&self, f: impl FnOnce(&mut Session)) -> Result<()> {
        let snapshot = {
            let mut guard = self.write();
            f(&mut guard);
            guard.clone()
        };
        if let Some(file) = &self.file {
            file.save(&snapshot)?;
        }
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
