//! Event storage contract and in-memory implementation.
//!
//! The store owns events from insertion until they are deleted after a
//! successful upload or reclaimed by session eviction. Insertion order is
//! preserved; "oldest session" means the session of the earliest inserted
//! row still present.

use std::collections::HashSet;
use std::sync::Mutex;

use tracing::debug;

use er_common::{Event, EventId, SessionId};

/// One stored event as seen by the uploader: its ID plus the serialized
/// payload that goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    pub id: EventId,
    pub payload: String,
}

/// Persistent event storage consumed by the batching pipeline.
///
/// `insert` returns the number of rows stored; `0` signals an insert the
/// backend dropped, which callers log and move past.
pub trait EventStore: Send + Sync {
    fn insert(&self, event: &Event) -> usize;
    fn total_size_bytes(&self) -> u64;
    fn event_count(&self) -> usize;
    fn oldest_session_id(&self) -> Option<SessionId>;
    fn delete_session(&self, session_id: &SessionId);
    fn fetch_up_to(&self, limit: usize) -> Vec<StoredEvent>;
    fn delete_by_ids(&self, ids: &[EventId]);
    fn delete_all(&self);
}

#[derive(Debug, Clone)]
struct Row {
    id: EventId,
    session_id: SessionId,
    payload: String,
    size_bytes: u64,
}

/// In-memory [`EventStore`] keyed by insertion order.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    rows: Mutex<Vec<Row>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for MemoryEventStore {
    fn insert(&self, event: &Event) -> usize {
        let payload = event.payload();
        let size_bytes = payload.len() as u64;
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        if rows.iter().any(|r| r.id == event.id) {
            // Duplicate insert stores nothing; replay must be idempotent.
            return 0;
        }
        rows.push(Row {
            id: event.id,
            session_id: event.session_id,
            payload,
            size_bytes,
        });
        1
    }

    fn total_size_bytes(&self) -> u64 {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.iter().map(|r| r.size_bytes).sum()
    }

    fn event_count(&self) -> usize {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.len()
    }

    fn oldest_session_id(&self) -> Option<SessionId> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.first().map(|r| r.session_id)
    }

    fn delete_session(&self, session_id: &SessionId) {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let before = rows.len();
        rows.retain(|r| r.session_id != *session_id);
        debug!(
            session_id = %session_id,
            deleted = before - rows.len(),
            "deleted session events"
        );
    }

    fn fetch_up_to(&self, limit: usize) -> Vec<StoredEvent> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.iter()
            .take(limit)
            .map(|r| StoredEvent {
                id: r.id,
                payload: r.payload.clone(),
            })
            .collect()
    }

    fn delete_by_ids(&self, ids: &[EventId]) {
        let ids: HashSet<&EventId> = ids.iter().collect();
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.retain(|r| !ids.contains(&r.id));
    }

    fn delete_all(&self) {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use er_common::Priority;
    use serde_json::json;

    fn event_in(session: SessionId) -> Event {
        Event::new("test_event", json!({"k": "v"}), session, Priority::Normal)
    }

    #[test]
    fn test_insert_and_count() {
        let store = MemoryEventStore::new();
        assert_eq!(store.event_count(), 0);
        assert_eq!(store.total_size_bytes(), 0);

        let event = event_in(SessionId::new());
        assert_eq!(store.insert(&event), 1);
        assert_eq!(store.event_count(), 1);
        assert_eq!(store.total_size_bytes(), event.payload_size_bytes());
    }

    #[test]
    fn test_duplicate_insert_stores_nothing() {
        let store = MemoryEventStore::new();
        let event = event_in(SessionId::new());
        assert_eq!(store.insert(&event), 1);
        assert_eq!(store.insert(&event), 0);
        assert_eq!(store.event_count(), 1);
    }

    #[test]
    fn test_oldest_session_follows_insertion_order() {
        let store = MemoryEventStore::new();
        let first = SessionId::new();
        let second = SessionId::new();
        store.insert(&event_in(first));
        store.insert(&event_in(second));
        store.insert(&event_in(first));
        assert_eq!(store.oldest_session_id(), Some(first));

        store.delete_session(&first);
        assert_eq!(store.event_count(), 1);
        assert_eq!(store.oldest_session_id(), Some(second));
    }

    #[test]
    fn test_fetch_up_to_and_delete_by_ids() {
        let store = MemoryEventStore::new();
        let session = SessionId::new();
        let events: Vec<Event> = (0..5).map(|_| event_in(session)).collect();
        for e in &events {
            store.insert(e);
        }

        let batch = store.fetch_up_to(3);
        assert_eq!(batch.len(), 3);
        // Oldest first.
        assert_eq!(batch[0].id, events[0].id);

        let ids: Vec<EventId> = batch.iter().map(|s| s.id).collect();
        store.delete_by_ids(&ids);
        assert_eq!(store.event_count(), 2);
        assert_eq!(store.fetch_up_to(10)[0].id, events[3].id);
    }

    #[test]
    fn test_fetch_beyond_count() {
        let store = MemoryEventStore::new();
        store.insert(&event_in(SessionId::new()));
        assert_eq!(store.fetch_up_to(100).len(), 1);
    }

    #[test]
    fn test_delete_all() {
        let store = MemoryEventStore::new();
        for _ in 0..3 {
            store.insert(&event_in(SessionId::new()));
        }
        store.delete_all();
        assert_eq!(store.event_count(), 0);
        assert_eq!(store.oldest_session_id(), None);
    }
}
