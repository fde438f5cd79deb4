//! Event Relay persistence contracts.
//!
//! This crate provides:
//! - The [`EventStore`] contract the upload pipeline pulls batches from,
//!   with an in-memory implementation
//! - The [`PreferenceStore`] contract for small persisted scalars, with an
//!   in-memory implementation and a durable file-backed one
//!
//! The on-disk schema of a production event store is deliberately out of
//! scope; the pipeline only ever talks to the traits defined here.

pub mod event_store;
pub mod prefs;

pub use event_store::{EventStore, MemoryEventStore, StoredEvent};
pub use prefs::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, StoreError};
