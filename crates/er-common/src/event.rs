//! The analytics event model.
//!
//! Events are created by the host application at occurrence time, are
//! immutable once stored, and are destroyed when successfully uploaded or
//! when storage eviction reclaims space. The priority class controls how
//! aggressively an event's upload is throttled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{EventId, SessionId};

/// Upload priority class for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Urgent events bypass throttling (short fixed delay).
    High,
    /// Default class, bounded by the normal batch delay.
    Normal,
    /// Most aggressively throttled, especially while backgrounded.
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// A discrete analytics event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event type name, e.g. `"screen_view"`.
    pub event_type: String,

    /// Opaque payload supplied by the host application.
    pub data: serde_json::Value,

    /// Unique event ID.
    pub id: EventId,

    /// Session this event occurred in.
    pub session_id: SessionId,

    /// Wall-clock time the event occurred.
    pub occurred_at: DateTime<Utc>,

    /// Upload priority class.
    #[serde(default)]
    pub priority: Priority,
}

impl Event {
    /// Create a new event occurring now, with a fresh ID.
    pub fn new(
        event_type: impl Into<String>,
        data: serde_json::Value,
        session_id: SessionId,
        priority: Priority,
    ) -> Self {
        Event {
            event_type: event_type.into(),
            data,
            id: EventId::new(),
            session_id,
            occurred_at: Utc::now(),
            priority,
        }
    }

    /// Whether the event carries all required fields.
    ///
    /// A missing type or null payload is a caller bug; such events are
    /// logged and dropped upstream rather than rejected with an error.
    pub fn is_well_formed(&self) -> bool {
        !self.event_type.trim().is_empty() && !self.data.is_null()
    }

    /// Serialized form stored and uploaded for this event.
    pub fn payload(&self) -> String {
        // Serialization of a Value-bearing struct cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Size in bytes of the stored payload.
    pub fn payload_size_bytes(&self) -> u64 {
        self.payload().len() as u64
    }
}
