//! Offline-first sync.
//!
//! Local SQLite is the primary store; the remote holds one bundle document
//! per user. Records are keyed by tag:
//!
//! - **Pull**: remote records with unknown tags are inserted locally
//! - **Push**: the local set plus remote-only records is merge-written back
//! - **Isolation**: on user switch, other users' local rows are purged
//!
//! # Example
//!
//! ```ignore
//! use fieldsync::sync::{SyncConfig, SyncEngine};
//!
//! let engine = SyncEngine::new(local, remote, session, identity, SyncConfig::default());
//! let report = engine.resume().await?;
//! ```

mod engine;
mod guard;
mod hash;
mod merge;
mod status;
mod types;

pub use engine::SyncEngine;
pub use guard::{InFlight, InFlightGuard};
pub use hash::content_hash;
pub use merge::{bundle_records, records_to_pull};
pub use status::{print_logout_report, print_status, print_step, print_sync_report};
pub use types::{
    DEFAULT_PUSH_TIMEOUT, DEFAULT_SYNC_EVERY, DEFAULT_SYNC_TIMEOUT, LogoutOptions, LogoutReport,
    MergeStats, PushReport, ResumeReport, StepOutcome, SwitchCleanup, SyncConfig, SyncOutcome,
    SyncReport, SyncStatus,
};
