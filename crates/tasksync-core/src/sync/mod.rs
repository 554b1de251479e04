//! Reconciliation engine between the local store and the remote service.
//!
//! A run stages the remote side in a [`MirrorStore`], diffs local tasks
//! against it, resolves conflicts with [`ConflictResolver`], guards every
//! create with the [`Deduplicator`] and persists the outcome through
//! [`MetadataStore`].

mod conflict;
mod dedup;
mod flight;
mod metadata_store;
mod mirror;
mod orchestrator;


pub use conflict::{ConflictResolver, Winner};
pub use dedup::{signature, Deduplicator, Signature};
pub use flight::{FlightGuard, InFlightAccounts};
pub use metadata_store::MetadataStore;
pub use mirror::{MirrorDiff, MirrorRecord, MirrorStore, TaskPair};
pub use orchestrator::{SyncOrchestrator, SyncReport};
