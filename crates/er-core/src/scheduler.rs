//! Upload scheduling: at most one pending upload, converging to the
//! earliest requested send time.
//!
//! Multiple events of different priorities may arrive between upload
//! attempts, each independently requesting an upload; the persisted
//! `scheduled_send_at` plus the dispatcher's pending check keep the result
//! a single job at the earliest requested time. A pending upload is never
//! pushed later.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::dispatch::{ConnectivityProbe, JobDispatcher};
use crate::schedule::ScheduleState;

/// Logical job name for the batch upload.
pub const UPLOAD_JOB: &str = "event-relay.upload";

/// Decides whether to (re)schedule the upload job.
pub struct UploadScheduler {
    dispatcher: Arc<dyn JobDispatcher>,
    connectivity: Arc<dyn ConnectivityProbe>,
    schedule: ScheduleState,
}

impl UploadScheduler {
    pub fn new(
        dispatcher: Arc<dyn JobDispatcher>,
        connectivity: Arc<dyn ConnectivityProbe>,
        schedule: ScheduleState,
    ) -> Self {
        UploadScheduler {
            dispatcher,
            connectivity,
            schedule,
        }
    }

    /// Request that an upload run `delay_ms` from `now_ms`.
    ///
    /// If an upload is already pending: a past-due schedule with no
    /// connectivity is left alone (a retry is in flight and nothing
    /// productive can happen until connectivity returns); an existing
    /// earlier-or-equal schedule is left alone; otherwise the pending job
    /// is canceled and replaced with the earlier time.
    pub fn request_upload(&self, delay_ms: u64, now_ms: u64) {
        let candidate_send_at = now_ms.saturating_add(delay_ms);
        let previous_send_at = self.schedule.scheduled_send_at_ms();

        if self.dispatcher.is_scheduled(UPLOAD_JOB) {
            if previous_send_at < now_ms && !self.connectivity.is_connected() {
                debug!("upload is retrying from a previous attempt, not rescheduling");
                return;
            }

            if previous_send_at <= candidate_send_at {
                debug!(
                    scheduled_send_at_ms = previous_send_at,
                    "upload already scheduled for an earlier time"
                );
                return;
            }

            self.dispatcher.cancel(UPLOAD_JOB);
        }

        debug!(delay_ms, "scheduling event upload");
        self.dispatcher
            .dispatch(UPLOAD_JOB, Duration::from_millis(delay_ms));
        self.schedule.set_scheduled_send_at_ms(candidate_send_at);
    }
}
