//! fieldsync - Offline-first capture and sync of tagged geolocation records
//!
//! This crate provides the core functionality for the `fieldsync` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`codec`] - Flat `key:value` record format and manual input parsing
//! - [`ingest`] - Verification and the capture pipeline
//! - [`model`] - Data types (Record, RemoteBundle, Session)
//! - [`storage`] - SQLite database layer
//! - [`remote`] - Remote bundle stores (HTTP, in-memory)
//! - [`sync`] - Pull/merge/push engine and user isolation
//! - [`identity`] - Device identity
//! - [`config`] - Paths and settings
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod identity;
pub mod ingest;
pub mod model;
pub mod remote;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
