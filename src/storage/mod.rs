//! Local storage layer for fieldsync.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode for concurrent reads
//! - Transaction discipline for atomic writes
//! - Audit events for history
//!
//! # Submodules
//!
//! - [`events`] - Audit event storage
//! - [`local`] - The `LocalStore` contract used by the sync engine
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod events;
pub mod local;
pub mod schema;
pub mod sqlite;

pub use local::LocalStore;
pub use sqlite::{MutationContext, OwnerCount, SqliteStorage};
