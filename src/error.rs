//! Error types for fieldsync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=persistence, 4=input, 6=sync, etc.)
//! - Retryability flags for callers that re-trigger work
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for fieldsync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Persistence (exit 2)
    NotInitialized,
    PersistenceError,

    // Session (exit 3)
    NoActiveUser,

    // Input validation (exit 4)
    InvalidInputFormat,
    InvalidFormat,

    // Remote rejection (exit 5)
    ValidationRejected,

    // Sync (exit 6)
    TransportError,
    SyncTimeout,
    PurgeError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::PersistenceError => "PERSISTENCE_ERROR",
            Self::NoActiveUser => "NO_ACTIVE_USER",
            Self::InvalidInputFormat => "INVALID_INPUT_FORMAT",
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::ValidationRejected => "VALIDATION_REJECTED",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::SyncTimeout => "SYNC_TIMEOUT",
            Self::PurgeError => "PURGE_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::PersistenceError => 2,
            Self::NoActiveUser => 3,
            Self::InvalidInputFormat | Self::InvalidFormat => 4,
            Self::ValidationRejected => 5,
            Self::TransportError | Self::SyncTimeout | Self::PurgeError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether re-issuing the same operation later can succeed.
    ///
    /// True for transport failures and timeouts (connectivity is
    /// intermittent) and for purge failures. False for rejected or
    /// malformed content, which needs corrected input instead.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransportError | Self::SyncTimeout | Self::PurgeError | Self::PersistenceError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in fieldsync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: no local database at {path}")]
    NotInitialized { path: PathBuf },

    #[error("No active user: log in first")]
    NoActiveUser,

    /// Manual input did not have the `tag-lat-lon-note` shape.
    #[error("Invalid input format: {0}")]
    InvalidInputFormat(String),

    /// A record field failed codec validation.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Payload rejected by verification service: {0}")]
    ValidationRejected(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sync timed out during {phase} after {}s", after.as_secs())]
    SyncTimeout { phase: &'static str, after: Duration },

    #[error("Failed to purge records of other users: {0}")]
    Purge(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized { .. } => ErrorCode::NotInitialized,
            Self::NoActiveUser => ErrorCode::NoActiveUser,
            Self::InvalidInputFormat(_) => ErrorCode::InvalidInputFormat,
            Self::InvalidFormat(_) => ErrorCode::InvalidFormat,
            Self::ValidationRejected(_) => ErrorCode::ValidationRejected,
            Self::Transport(_) | Self::Http(_) => ErrorCode::TransportError,
            Self::SyncTimeout { .. } => ErrorCode::SyncTimeout,
            Self::Purge(_) => ErrorCode::PurgeError,
            Self::Database(_) | Self::Persistence(_) => ErrorCode::PersistenceError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized { path } => Some(format!(
                "Run `fieldsync login <user>` to create the database at {}",
                path.display()
            )),
            Self::NoActiveUser => Some("Log in: fieldsync login <username>".to_string()),
            Self::InvalidInputFormat(_) => Some(
                "Expected tag-latitude-longitude-note, e.g. ABC123-10.5--75.2-north gate"
                    .to_string(),
            ),
            Self::InvalidFormat(msg) => {
                if msg.contains("latitude") {
                    Some("Latitude must be a decimal number between -90 and 90".to_string())
                } else if msg.contains("longitude") {
                    Some("Longitude must be a decimal number between -180 and 180".to_string())
                } else {
                    None
                }
            }
            Self::Transport(_) | Self::Http(_) | Self::SyncTimeout { .. } => Some(
                "Local data is unchanged. Run `fieldsync sync` again once connectivity returns."
                    .to_string(),
            ),
            Self::ValidationRejected(_)
            | Self::Purge(_)
            | Self::Database(_)
            | Self::Persistence(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(Error::NoActiveUser.exit_code(), 3);
        assert_eq!(Error::InvalidFormat("x".into()).exit_code(), 4);
        assert_eq!(Error::InvalidInputFormat("x".into()).exit_code(), 4);
        assert_eq!(Error::ValidationRejected("x".into()).exit_code(), 5);
        assert_eq!(Error::Transport("x".into()).exit_code(), 6);
        assert_eq!(Error::Other("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = Error::SyncTimeout {
            phase: "push",
            after: Duration::from_secs(15),
        };
        assert!(err.error_code().is_retryable());
        assert_eq!(err.to_string(), "Sync timed out during push after 15s");
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let err = Error::InvalidFormat("latitude out of range (-90 to 90): 95.0".into());
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "INVALID_FORMAT");
        assert_eq!(json["error"]["retryable"], false);
        assert!(json["error"]["hint"].as_str().unwrap().contains("-90"));
    }
}
