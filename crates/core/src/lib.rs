//! HashVault core: upload orchestration and provenance listing.
//!
//! [`UploadOrchestrator`] turns a byte buffer into a content address and a
//! committed ledger record, stepping through the pure lifecycle in
//! [`machine`]. [`ProvenanceIndex`] rebuilds an owner's history from the
//! ledger's per-owner layout.

pub mod cache;
pub mod config;
pub mod errors;
pub mod index;
pub mod machine;
pub mod orchestrator;

pub use cache::{Generation, IndexCache};
pub use config::CoreConfig;
pub use errors::{ConfigError, ErrorKind, IndexError, UploadError};
pub use index::{DroppedRecord, Listing, ListingOutcome, ProvenanceIndex};
pub use machine::{Effect, MachineInput, Transition, TransitionError, UploadState};
pub use orchestrator::{UploadEvent, UploadHandle, UploadOrchestrator, UploadOutcome};
