//! Remote bundle stores.
//!
//! # Submodules
//!
//! - [`store`] - The `RemoteStore` trait
//! - [`http`] - Document service over HTTP (reqwest)
//! - [`memory`] - In-process store with failure switches

pub mod http;
pub mod memory;
pub mod store;

pub use http::HttpRemoteStore;
pub use memory::MemoryRemoteStore;
pub use store::RemoteStore;
