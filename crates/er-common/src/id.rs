//! Event and session identity types.
//!
//! Events are uniquely identified by a UUID assigned at creation time, and
//! grouped by the session in which they occurred. Session granularity is what
//! storage eviction operates on, so session IDs travel with every event.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a single analytics event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Generate a new random event ID.
    pub fn new() -> Self {
        EventId(Uuid::new_v4())
    }

    /// Parse an existing event ID string.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(EventId)
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for the application session an event belongs to.
///
/// A session spans one foreground visit; storage eviction deletes whole
/// sessions at a time so analytical coherence survives space pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }

    /// Parse an existing session ID string.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(SessionId)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_roundtrip() {
        let id = EventId::new();
        let parsed = EventId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_event_id_parse_rejects_garbage() {
        assert!(EventId::parse("not-a-uuid").is_none());
        assert!(EventId::parse("").is_none());
    }

    #[test]
    fn test_session_id_unique() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_id_serde_transparent() {
        let id = EventId::new();
        let json = serde_json::to_string(&id).unwrap();
        // Serializes as a bare string, not an object.
        assert!(json.starts_with('"'));
        let back: EventId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
