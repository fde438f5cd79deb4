//! Event Relay shared types.
//!
//! This crate provides foundational types shared across er-core modules:
//! - Event and session identity types
//! - The analytics event model and its priority classes
//! - Job outcome signaling for deferred work
//! - Wall-clock helpers

pub mod event;
pub mod id;
pub mod job;
pub mod time;

pub use event::{Event, Priority};
pub use id::{EventId, SessionId};
pub use job::JobOutcome;
pub use time::epoch_millis;
