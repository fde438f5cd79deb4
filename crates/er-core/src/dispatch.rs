//! Deferred-job dispatch and connectivity contracts.
//!
//! The pipeline schedules work through [`JobDispatcher`]: a named unit of
//! work runs once after a delay, with at most one concurrent execution per
//! name and best-effort (not exact) delivery. Hosts with their own job
//! runtime implement the trait; [`DeferredDispatcher`] is a thread-backed
//! implementation that also re-drives `Retry` outcomes after a fixed
//! backoff, since backoff policy lives in the runtime rather than in the
//! jobs themselves.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use er_common::JobOutcome;

/// Schedules named deferred work.
pub trait JobDispatcher: Send + Sync {
    /// Schedule `job` to run once after `delay`. Re-dispatching an already
    /// scheduled job replaces its deadline.
    fn dispatch(&self, job: &str, delay: Duration);

    /// Cancel a pending `job`. An execution already in flight is not
    /// interrupted.
    fn cancel(&self, job: &str);

    /// Whether `job` has a pending future execution. An execution already
    /// in flight does not count: callers deciding whether to dispatch again
    /// (a chained round, for instance) must see `false` for it, or the
    /// follow-up run would be deduplicated away and lost.
    fn is_scheduled(&self, job: &str) -> bool;
}

/// Best-effort, advisory connectivity signal.
pub trait ConnectivityProbe: Send + Sync {
    fn is_connected(&self) -> bool;
}

type Handler = Arc<dyn Fn() -> JobOutcome + Send + Sync>;

#[derive(Debug, Default)]
struct Slot {
    /// Bumped on every dispatch/cancel; a sleeping timer only fires if the
    /// generation it captured is still current.
    generation: u64,
    scheduled: bool,
    running: bool,
}

struct Inner {
    handlers: Mutex<HashMap<String, Handler>>,
    slots: Mutex<HashMap<String, Slot>>,
    retry_backoff: Duration,
}

impl Inner {
    fn schedule(self: &Arc<Self>, job: &str, delay: Duration) {
        let generation = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            let slot = slots.entry(job.to_string()).or_default();
            slot.generation = slot.generation.wrapping_add(1);
            slot.scheduled = true;
            slot.generation
        };

        let inner = Arc::clone(self);
        let job = job.to_string();
        thread::spawn(move || {
            thread::sleep(delay);
            Inner::fire(&inner, &job, generation);
        });
    }

    fn fire(inner: &Arc<Self>, job: &str, generation: u64) {
        let handler = {
            let mut slots = inner.slots.lock().unwrap_or_else(|e| e.into_inner());
            let slot = match slots.get_mut(job) {
                Some(slot) => slot,
                None => return,
            };
            if slot.generation != generation || !slot.scheduled {
                // Canceled or replaced while we slept.
                return;
            }
            if slot.running {
                // A previous execution is still in flight; try again shortly
                // rather than overlap. The job is never lost.
                drop(slots);
                inner.schedule(job, Duration::from_millis(50));
                return;
            }
            slot.scheduled = false;
            slot.running = true;
            let handlers = inner.handlers.lock().unwrap_or_else(|e| e.into_inner());
            handlers.get(job).cloned()
        };

        let outcome = match handler {
            Some(handler) => handler(),
            None => {
                warn!(job, "no handler registered for dispatched job");
                JobOutcome::Finished
            }
        };

        {
            let mut slots = inner.slots.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(slot) = slots.get_mut(job) {
                slot.running = false;
            }
        }

        if outcome == JobOutcome::Retry {
            debug!(job, backoff_ms = inner.retry_backoff.as_millis() as u64, "re-driving job");
            inner.schedule(job, inner.retry_backoff);
        }
    }
}

/// Thread-backed [`JobDispatcher`].
pub struct DeferredDispatcher {
    inner: Arc<Inner>,
}

impl DeferredDispatcher {
    pub fn new(retry_backoff: Duration) -> Self {
        DeferredDispatcher {
            inner: Arc::new(Inner {
                handlers: Mutex::new(HashMap::new()),
                slots: Mutex::new(HashMap::new()),
                retry_backoff,
            }),
        }
    }

    /// Register the work a job name runs. Replaces any previous handler.
    pub fn register_handler<F>(&self, job: &str, handler: F)
    where
        F: Fn() -> JobOutcome + Send + Sync + 'static,
    {
        let mut handlers = self.inner.handlers.lock().unwrap_or_else(|e| e.into_inner());
        handlers.insert(job.to_string(), Arc::new(handler));
    }
}

impl JobDispatcher for DeferredDispatcher {
    fn dispatch(&self, job: &str, delay: Duration) {
        debug!(job, delay_ms = delay.as_millis() as u64, "dispatching deferred job");
        self.inner.schedule(job, delay);
    }

    fn cancel(&self, job: &str) {
        let mut slots = self.inner.slots.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = slots.get_mut(job) {
            slot.generation = slot.generation.wrapping_add(1);
            slot.scheduled = false;
        }
    }

    fn is_scheduled(&self, job: &str) -> bool {
        let slots = self.inner.slots.lock().unwrap_or_else(|e| e.into_inner());
        // Only a pending future run counts; `running` guards overlap in
        // `fire`, not the dispatch decision.
        slots.get(job).map(|slot| slot.scheduled).unwrap_or(false)
    }
}
