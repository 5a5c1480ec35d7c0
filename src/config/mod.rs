//! Configuration management.
//!
//! Everything lives under one home directory, `~/.fieldsync/` by default:
//!
//! - `config.json` - user settings ([`Settings`])
//! - `session.json` - persisted session state ([`SessionFile`])
//! - `data/fieldsync.db` - the local record database

mod session_file;
mod settings;

pub use session_file::SessionFile;
pub use settings::{REMOTE_URL_ENV, Settings, VERIFY_URL_ENV};

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Env var overriding the home directory.
pub const HOME_ENV: &str = "FIELDSYNC_HOME";

/// Env var overriding the database path.
pub const DB_ENV: &str = "FIELDSYNC_DB";

/// Resolve the fieldsync home directory.
///
/// Priority:
/// 1. `FIELDSYNC_HOME` environment variable
/// 2. `~/.fieldsync`
#[must_use]
pub fn global_dir() -> Option<PathBuf> {
    if let Ok(home) = std::env::var(HOME_ENV) {
        if !home.trim().is_empty() {
            return Some(PathBuf::from(home));
        }
    }
    directories::BaseDirs::new().map(|b| b.home_dir().join(".fieldsync"))
}

fn require_global_dir() -> Result<PathBuf> {
    global_dir().ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Resolve the database path.
///
/// Priority:
/// 1. `explicit_path` (the `--db` flag)
/// 2. `FIELDSYNC_DB` environment variable
/// 3. `<home>/data/fieldsync.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(db_path) = std::env::var(DB_ENV) {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_dir().map(|dir| dir.join("data").join("fieldsync.db"))
}

/// Path of `config.json`.
///
/// # Errors
///
/// Returns `Error::Config` if no home directory can be determined.
pub fn config_path() -> Result<PathBuf> {
    require_global_dir().map(|dir| dir.join("config.json"))
}

/// Path of `session.json`.
///
/// # Errors
///
/// Returns `Error::Config` if no home directory can be determined.
pub fn session_path() -> Result<PathBuf> {
    require_global_dir().map(|dir| dir.join("session.json"))
}

/// Load `config.json` and apply env overrides.
///
/// # Errors
///
/// Returns `Error::Config` if the file is unreadable or invalid.
pub fn load_settings() -> Result<Settings> {
    Ok(Settings::load(&config_path()?)?.with_env())
}
