//! Data models for fieldsync.
//!
//! This module contains the domain models:
//! - Record / LocalRecord
//! - RemoteBundle
//! - Session / SessionContext

pub mod bundle;
pub mod record;
pub mod session;

pub use bundle::RemoteBundle;
pub use record::{LATITUDE_RANGE, LONGITUDE_RANGE, LocalRecord, Record};
pub use session::{Session, SessionContext};
