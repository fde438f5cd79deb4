//! Debounced foreground/background activity tracking.
//!
//! Surfaces (windows/screens) report start/stop signals; the tracker folds
//! those into a single foreground/background transition stream. Stops and
//! starts pair up in rapid succession during configuration changes such as
//! rotation, so the background notification is held back for a short
//! debounce window and any new start cancels it outright (cancel-on-restart,
//! not reset-on-restart).
//!
//! Lifecycle callbacks are expected to arrive serialized on one logical
//! timeline; the internal mutex additionally guards listener replacement
//! against a concurrently firing debounce timer.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::warn;

/// Delay after the last surface stops before the app counts as backgrounded.
/// Gives the app a chance to tear down and rebuild surfaces during rotation.
pub const BACKGROUND_DEBOUNCE_MS: u64 = 2_000;

/// Receiver for foreground/background transitions. Exactly one listener is
/// registered at a time; swapping implementations is a configuration
/// concern.
pub trait ActivityListener: Send {
    /// Called when the first surface starts (0 -> 1 transition).
    fn on_foreground(&self, timestamp_ms: u64);

    /// Called once the started-surface set has been empty for the full
    /// debounce window. `timestamp_ms` is the time of the last stop, not
    /// the time the window elapsed.
    fn on_background(&self, timestamp_ms: u64);
}

struct TrackerState {
    started: HashSet<u64>,
    last_stop_at_ms: u64,
    listener: Option<Box<dyn ActivityListener>>,
    /// Bumped on every start/stop; a debounce timer only delivers if the
    /// generation it captured is still current. Bump-under-lock makes
    /// cancel-then-insert atomic relative to the timer firing.
    generation: u64,
    /// State as last reported to the listener. During the debounce window
    /// this still says "foreground" even though the set is empty.
    reported_foreground: bool,
}

/// Tracks started surfaces and emits debounced transitions.
pub struct ForegroundTracker {
    state: Arc<Mutex<TrackerState>>,
    debounce_ms: u64,
}

impl ForegroundTracker {
    /// Tracker with the standard debounce window.
    pub fn new() -> Self {
        Self::with_debounce_ms(BACKGROUND_DEBOUNCE_MS)
    }

    /// Tracker with a custom debounce window.
    pub fn with_debounce_ms(debounce_ms: u64) -> Self {
        ForegroundTracker {
            state: Arc::new(Mutex::new(TrackerState {
                started: HashSet::new(),
                last_stop_at_ms: 0,
                listener: None,
                generation: 0,
                reported_foreground: false,
            })),
            debounce_ms,
        }
    }

    /// Replace the transition listener.
    pub fn set_listener(&self, listener: Box<dyn ActivityListener>) {
        let mut state = self.lock();
        state.listener = Some(listener);
    }

    /// Track a surface start.
    ///
    /// Re-entrant start is a caller bug: logged and ignored. Otherwise any
    /// pending background notification is canceled, and the first start
    /// synchronously notifies `on_foreground`.
    pub fn surface_started(&self, surface_id: u64, timestamp_ms: u64) {
        let mut state = self.lock();
        if state.started.contains(&surface_id) {
            warn!(surface_id, "surface start was already tracked");
            return;
        }

        state.generation = state.generation.wrapping_add(1);
        state.started.insert(surface_id);

        if state.started.len() == 1 {
            state.reported_foreground = true;
            if let Some(listener) = state.listener.as_ref() {
                listener.on_foreground(timestamp_ms);
            }
        }
    }

    /// Track a surface stop.
    ///
    /// A stop for a surface that was never started is logged and ignored.
    /// When the last surface stops, a debounce timer is armed; if it fires
    /// with the set still empty, `on_background` is delivered with the
    /// recorded last-stop time.
    pub fn surface_stopped(&self, surface_id: u64, timestamp_ms: u64) {
        let mut state = self.lock();
        if !state.started.contains(&surface_id) {
            warn!(surface_id, "surface stop without a tracked start");
            return;
        }

        state.generation = state.generation.wrapping_add(1);
        state.started.remove(&surface_id);
        state.last_stop_at_ms = timestamp_ms;

        if state.started.is_empty() {
            let generation = state.generation;
            drop(state);
            self.arm_background_timer(generation);
        }
    }

    /// Foreground state as last reported to the listener. While the
    /// debounce window is open the previous (foreground) state is still
    /// reported to avoid flapping on quick surface handoffs.
    pub fn is_foreground(&self) -> bool {
        self.lock().reported_foreground
    }

    fn arm_background_timer(&self, generation: u64) {
        let state = Arc::clone(&self.state);
        let debounce_ms = self.debounce_ms;
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(debounce_ms));
            let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
            if state.generation != generation || !state.started.is_empty() {
                // Canceled by a newer start/stop.
                return;
            }
            state.reported_foreground = false;
            let timestamp_ms = state.last_stop_at_ms;
            if let Some(listener) = state.listener.as_ref() {
                listener.on_background(timestamp_ms);
            }
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ForegroundTracker {
    fn default() -> Self {
        Self::new()
    }
}
