//! Persisted schedule state.
//!
//! Typed accessors over the preference store for the scalars that drive
//! batching: when we last sent, when the pending upload is due, and the
//! four server-advised limits. Each field is read/written individually;
//! there is deliberately no multi-field transaction (a crash between
//! deleting uploaded events and persisting fresh limits may replay a
//! slightly stale limit on next launch, which is accepted).

use std::sync::Arc;

use er_config::AnalyticsConfig;
use er_store::PreferenceStore;

use crate::policy::ScheduleSnapshot;
use crate::transport::EventResponse;

pub const LAST_SEND_KEY: &str = "analytics.last_send_ms";
pub const SCHEDULED_SEND_KEY: &str = "analytics.scheduled_send_ms";
pub const MAX_TOTAL_DB_SIZE_KEY: &str = "analytics.max_total_db_size_bytes";
pub const MAX_BATCH_SIZE_KEY: &str = "analytics.max_batch_size_bytes";
pub const MAX_WAIT_KEY: &str = "analytics.max_wait_ms";
pub const MIN_BATCH_INTERVAL_KEY: &str = "analytics.min_batch_interval_ms";

/// Fallbacks used until the first successful upload response.
#[derive(Debug, Clone, Copy)]
struct LimitFallbacks {
    max_total_db_size_bytes: u64,
    max_batch_size_bytes: u64,
    max_wait_ms: u64,
    min_batch_interval_ms: u64,
}

/// Handle to the persisted schedule scalars. Cheap to clone; clones share
/// the underlying preference store.
#[derive(Clone)]
pub struct ScheduleState {
    prefs: Arc<dyn PreferenceStore>,
    fallbacks: LimitFallbacks,
}

impl ScheduleState {
    pub fn new(prefs: Arc<dyn PreferenceStore>, config: &AnalyticsConfig) -> Self {
        ScheduleState {
            prefs,
            fallbacks: LimitFallbacks {
                max_total_db_size_bytes: config.max_total_db_size_bytes,
                max_batch_size_bytes: config.max_batch_size_bytes,
                max_wait_ms: config.max_wait_ms,
                min_batch_interval_ms: config.min_batch_interval_ms,
            },
        }
    }

    /// Wall-clock time of the last upload attempt (0 = never).
    pub fn last_send_at_ms(&self) -> u64 {
        self.prefs.get_u64(LAST_SEND_KEY, 0)
    }

    pub fn set_last_send_at_ms(&self, value: u64) {
        self.prefs.put_u64(LAST_SEND_KEY, value);
    }

    /// Wall-clock time the pending upload is expected to fire (0 = none
    /// ever recorded). Single source of truth for "is something already
    /// scheduled and for when".
    pub fn scheduled_send_at_ms(&self) -> u64 {
        self.prefs.get_u64(SCHEDULED_SEND_KEY, 0)
    }

    pub fn set_scheduled_send_at_ms(&self, value: u64) {
        self.prefs.put_u64(SCHEDULED_SEND_KEY, value);
    }

    pub fn max_total_db_size_bytes(&self) -> u64 {
        self.prefs
            .get_u64(MAX_TOTAL_DB_SIZE_KEY, self.fallbacks.max_total_db_size_bytes)
    }

    pub fn max_batch_size_bytes(&self) -> u64 {
        self.prefs
            .get_u64(MAX_BATCH_SIZE_KEY, self.fallbacks.max_batch_size_bytes)
    }

    pub fn max_wait_ms(&self) -> u64 {
        self.prefs.get_u64(MAX_WAIT_KEY, self.fallbacks.max_wait_ms)
    }

    pub fn min_batch_interval_ms(&self) -> u64 {
        self.prefs
            .get_u64(MIN_BATCH_INTERVAL_KEY, self.fallbacks.min_batch_interval_ms)
    }

    /// Replace the server-advised limits with a successful response's
    /// values, unconditionally.
    pub fn apply_response(&self, response: &EventResponse) {
        self.prefs
            .put_u64(MAX_TOTAL_DB_SIZE_KEY, response.max_total_size);
        self.prefs.put_u64(MAX_BATCH_SIZE_KEY, response.max_batch_size);
        self.prefs.put_u64(MAX_WAIT_KEY, response.max_wait);
        self.prefs
            .put_u64(MIN_BATCH_INTERVAL_KEY, response.min_batch_interval);
    }

    /// Snapshot of the fields the batching policy reads.
    pub fn snapshot(&self) -> ScheduleSnapshot {
        ScheduleSnapshot {
            last_send_at_ms: self.last_send_at_ms(),
            min_batch_interval_ms: self.min_batch_interval_ms(),
        }
    }
}
