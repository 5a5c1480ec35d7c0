//! Command implementations.

pub mod app;
pub mod capture;
pub mod completions;
pub mod list;
pub mod session;
pub mod sync;
