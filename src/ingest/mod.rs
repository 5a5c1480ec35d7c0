//! Record ingestion.
//!
//! - [`verifier`] - Payload verification (HTTP service or offline)
//! - [`pipeline`] - Validate, verify, persist, then push opportunistically

pub mod pipeline;
pub mod verifier;

pub use pipeline::{IngestPipeline, Ingested, NOT_SYNCED, Stage, SyncState, SyncTicket};
pub use verifier::{
    ACCEPTED_STATUS, BoxedVerifier, HttpVerifier, LocalVerifier, Verification, Verifier,
    create_verifier,
};
