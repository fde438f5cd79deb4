//! Event Relay core: event batching and adaptive upload scheduling.
//!
//! This crate implements the state-machine heart of the pipeline:
//!
//! - **activity**: debounced foreground/background tracking from surface
//!   start/stop signals.
//! - **policy**: pure delay computation from priority, schedule state, and
//!   foreground state.
//! - **scheduler**: at-most-one pending upload, converging to the earliest
//!   requested send time.
//! - **uploader**: one bounded upload attempt, applying server-advised
//!   limits and chaining until the store drains.
//! - **pipeline**: the facade wiring insertion, eviction, and job routing
//!   over the collaborator traits.
//!
//! Storage, transport, job dispatch, preferences, and connectivity are all
//! reached through narrow traits so hosts bring their own backends.

pub mod activity;
pub mod dispatch;
pub mod pipeline;
pub mod policy;
pub mod schedule;
pub mod scheduler;
pub mod transport;
pub mod uploader;

pub use activity::{ActivityListener, ForegroundTracker};
pub use dispatch::{ConnectivityProbe, DeferredDispatcher, JobDispatcher};
pub use pipeline::{Analytics, Collaborators, JobKind, REFRESH_IDENTIFIERS_JOB};
pub use policy::{
    next_delay, ScheduleSnapshot, HIGH_PRIORITY_BATCH_DELAY_MS, LOW_PRIORITY_BATCH_DELAY_MS,
    MAX_BATCH_EVENT_COUNT, NORMAL_PRIORITY_BATCH_DELAY_MS,
};
pub use schedule::ScheduleState;
pub use scheduler::{UploadScheduler, UPLOAD_JOB};
pub use transport::{
    AssociatedIdentifiers, ChannelRegistry, EventResponse, IdentifierProvider, IdentityError,
    Transport, TransportError,
};
pub use uploader::UploadExecutor;
