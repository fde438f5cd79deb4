//! One upload attempt: pull a bounded batch, send it, apply the server's
//! guidance, and chain another round if the store is not drained.

use std::sync::Arc;

use tracing::debug;

use er_common::{EventId, JobOutcome, Priority};
use er_store::EventStore;

use crate::policy::{self, MAX_BATCH_EVENT_COUNT};
use crate::schedule::ScheduleState;
use crate::scheduler::UploadScheduler;
use crate::transport::{ChannelRegistry, Transport};

/// Performs upload attempts when the scheduled job fires.
pub struct UploadExecutor {
    store: Arc<dyn EventStore>,
    transport: Arc<dyn Transport>,
    channel: Arc<dyn ChannelRegistry>,
    schedule: ScheduleState,
    scheduler: Arc<UploadScheduler>,
}

impl UploadExecutor {
    pub fn new(
        store: Arc<dyn EventStore>,
        transport: Arc<dyn Transport>,
        channel: Arc<dyn ChannelRegistry>,
        schedule: ScheduleState,
        scheduler: Arc<UploadScheduler>,
    ) -> Self {
        UploadExecutor {
            store,
            transport,
            channel,
            schedule,
            scheduler,
        }
    }

    /// Run one upload attempt.
    ///
    /// `last_send_at` is stamped before anything else, success or not, so
    /// the next interval calculation is anchored even when this attempt
    /// fails immediately. An empty store or missing channel ID terminates
    /// successfully with no network call. A transport failure reports
    /// `Retry` and leaves stored events untouched.
    pub fn run_upload_attempt(&self, now_ms: u64) -> JobOutcome {
        self.schedule.set_last_send_at_ms(now_ms);

        if self.channel.channel_id().is_none() {
            debug!("no channel ID, skipping event upload");
            return JobOutcome::Finished;
        }

        let event_count = self.store.event_count();
        if event_count == 0 {
            debug!("no events to send, ending upload");
            return JobOutcome::Finished;
        }

        // Size-aware cap: pull roughly enough events to fill the server's
        // byte budget, never more than the hard count cap.
        let avg_size = (self.store.total_size_bytes() / event_count as u64).max(1);
        let batch_count = MAX_BATCH_EVENT_COUNT
            .min((self.schedule.max_batch_size_bytes() / avg_size) as usize);

        let batch = self.store.fetch_up_to(batch_count);
        let payloads: Vec<String> = batch.iter().map(|e| e.payload.clone()).collect();

        let response = match self.transport.send(&payloads) {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                debug!(status = response.status, "event upload rejected, will retry");
                return JobOutcome::Retry;
            }
            Err(e) => {
                debug!(error = %e, "event upload failed, will retry");
                return JobOutcome::Retry;
            }
        };

        debug!(count = batch.len(), "event batch uploaded");
        let ids: Vec<EventId> = batch.iter().map(|e| e.id).collect();
        self.store.delete_by_ids(&ids);
        self.schedule.apply_response(&response);

        // Events beyond this batch remain: chain the next round at the
        // normal-priority delay computed from the fresh limits.
        if event_count > batch.len() {
            let delay_ms = policy::next_delay(
                Priority::Normal,
                now_ms,
                &self.schedule.snapshot(),
                // Foreground state only affects low priority.
                false,
                0,
            );
            self.scheduler.request_upload(delay_ms, now_ms);
        }

        JobOutcome::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{ConnectivityProbe, JobDispatcher};
    use crate::transport::{EventResponse, TransportError};
    use er_common::{Event, SessionId};
    use er_config::AnalyticsConfig;
    use er_store::{MemoryEventStore, MemoryPreferenceStore};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct ScriptedTransport {
        responses: Mutex<Vec<Result<EventResponse, TransportError>>>,
        sent_batches: Mutex<Vec<usize>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<EventResponse, TransportError>>) -> Self {
            ScriptedTransport {
                responses: Mutex::new(responses),
                sent_batches: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.sent_batches.lock().unwrap().len()
        }
    }

    impl Transport for ScriptedTransport {
        fn send(&self, batch: &[String]) -> Result<EventResponse, TransportError> {
            self.sent_batches.lock().unwrap().push(batch.len());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Err(TransportError::NoResponse)
            } else {
                responses.remove(0)
            }
        }
    }

    struct FixedChannel(Option<String>);

    impl ChannelRegistry for FixedChannel {
        fn channel_id(&self) -> Option<String> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct ManualDispatcher {
        scheduled: AtomicBool,
        dispatches: AtomicUsize,
    }

    impl JobDispatcher for ManualDispatcher {
        fn dispatch(&self, _job: &str, _delay: Duration) {
            self.scheduled.store(true, Ordering::SeqCst);
            self.dispatches.fetch_add(1, Ordering::SeqCst);
        }

        fn cancel(&self, _job: &str) {
            self.scheduled.store(false, Ordering::SeqCst);
        }

        fn is_scheduled(&self, _job: &str) -> bool {
            self.scheduled.load(Ordering::SeqCst)
        }
    }

    struct AlwaysConnected;

    impl ConnectivityProbe for AlwaysConnected {
        fn is_connected(&self) -> bool {
            true
        }
    }

    fn ok_response() -> EventResponse {
        EventResponse {
            status: 200,
            max_total_size: 4 * 1024 * 1024,
            max_batch_size: 400 * 1024,
            max_wait: 7 * 24 * 3600 * 1000,
            min_batch_interval: 120_000,
        }
    }

    struct Harness {
        store: Arc<MemoryEventStore>,
        transport: Arc<ScriptedTransport>,
        dispatcher: Arc<ManualDispatcher>,
        schedule: ScheduleState,
        executor: UploadExecutor,
    }

    fn harness(
        channel: Option<String>,
        responses: Vec<Result<EventResponse, TransportError>>,
    ) -> Harness {
        let store = Arc::new(MemoryEventStore::new());
        let transport = Arc::new(ScriptedTransport::new(responses));
        let dispatcher = Arc::new(ManualDispatcher::default());
        let schedule = ScheduleState::new(
            Arc::new(MemoryPreferenceStore::new()),
            &AnalyticsConfig::default(),
        );
        let scheduler = Arc::new(UploadScheduler::new(
            Arc::clone(&dispatcher) as Arc<dyn JobDispatcher>,
            Arc::new(AlwaysConnected),
            schedule.clone(),
        ));
        let executor = UploadExecutor::new(
            Arc::clone(&store) as Arc<dyn EventStore>,
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::new(FixedChannel(channel)),
            schedule.clone(),
            scheduler,
        );
        Harness {
            store,
            transport,
            dispatcher,
            schedule,
            executor,
        }
    }

    fn fill_store(store: &MemoryEventStore, count: usize) {
        let session = SessionId::new();
        for i in 0..count {
            store.insert(&Event::new(
                "test_event",
                json!({"n": i}),
                session,
                Priority::Normal,
            ));
        }
    }

    #[test]
    fn test_no_channel_skips_without_network_call() {
        let h = harness(None, vec![Ok(ok_response())]);
        fill_store(&h.store, 3);

        let outcome = h.executor.run_upload_attempt(1_000_000);
        assert_eq!(outcome, JobOutcome::Finished);
        assert_eq!(h.transport.calls(), 0);
        assert_eq!(h.store.event_count(), 3);
        // last_send is stamped regardless.
        assert_eq!(h.schedule.last_send_at_ms(), 1_000_000);
    }

    #[test]
    fn test_empty_store_finishes_without_network_call() {
        let h = harness(Some("channel-1".into()), vec![Ok(ok_response())]);
        let outcome = h.executor.run_upload_attempt(1_000_000);
        assert_eq!(outcome, JobOutcome::Finished);
        assert_eq!(h.transport.calls(), 0);
    }

    #[test]
    fn test_failure_leaves_store_untouched() {
        let h = harness(Some("channel-1".into()), vec![Err(TransportError::NoResponse)]);
        fill_store(&h.store, 4);

        let outcome = h.executor.run_upload_attempt(2_000_000);
        assert_eq!(outcome, JobOutcome::Retry);
        assert_eq!(h.store.event_count(), 4);
        assert_eq!(h.schedule.last_send_at_ms(), 2_000_000);
        // No server guidance applied on failure.
        assert_eq!(
            h.schedule.min_batch_interval_ms(),
            AnalyticsConfig::default().min_batch_interval_ms
        );
    }

    #[test]
    fn test_non_200_status_is_retry() {
        let mut rejected = ok_response();
        rejected.status = 503;
        let h = harness(Some("channel-1".into()), vec![Ok(rejected)]);
        fill_store(&h.store, 2);

        assert_eq!(h.executor.run_upload_attempt(1_000), JobOutcome::Retry);
        assert_eq!(h.store.event_count(), 2);
    }

    #[test]
    fn test_success_deletes_uploaded_and_applies_limits() {
        let h = harness(Some("channel-1".into()), vec![Ok(ok_response())]);
        fill_store(&h.store, 5);

        let outcome = h.executor.run_upload_attempt(3_000_000);
        assert_eq!(outcome, JobOutcome::Finished);
        assert_eq!(h.transport.calls(), 1);
        assert_eq!(h.store.event_count(), 0);
        assert_eq!(h.schedule.max_batch_size_bytes(), 400 * 1024);
        assert_eq!(h.schedule.min_batch_interval_ms(), 120_000);
        // Fully drained: no chained upload.
        assert_eq!(h.dispatcher.dispatches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_remaining_events_chain_next_upload() {
        let h = harness(
            Some("channel-1".into()),
            vec![Ok(ok_response()), Ok(ok_response())],
        );
        fill_store(&h.store, 10);
        // Shrink the batch budget so one round cannot drain the store.
        let avg = h.store.total_size_bytes() / 10;
        h.schedule.apply_response(&EventResponse {
            max_batch_size: avg * 3,
            ..ok_response()
        });

        let outcome = h.executor.run_upload_attempt(5_000_000);
        assert_eq!(outcome, JobOutcome::Finished);
        assert_eq!(h.store.event_count(), 10 - 3);
        // A follow-up upload was requested through the scheduler.
        assert_eq!(h.dispatcher.dispatches.load(Ordering::SeqCst), 1);
        assert!(h.schedule.scheduled_send_at_ms() > 5_000_000);
    }

    #[test]
    fn test_batch_size_bound() {
        let h = harness(Some("channel-1".into()), vec![Ok(ok_response())]);
        fill_store(&h.store, 8);
        let avg = h.store.total_size_bytes() / 8;
        // Budget for exactly 2 average-sized events.
        h.schedule.apply_response(&EventResponse {
            max_batch_size: avg * 2,
            ..ok_response()
        });

        h.executor.run_upload_attempt(1_000_000);
        assert_eq!(*h.transport.sent_batches.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_batch_count_capped_at_hard_limit() {
        let h = harness(Some("channel-1".into()), vec![Ok(ok_response())]);
        fill_store(&h.store, 20);
        // A huge byte budget still cannot exceed MAX_BATCH_EVENT_COUNT; and
        // with fewer events than the cap, the whole store goes in one call.
        h.schedule.apply_response(&EventResponse {
            max_batch_size: u64::MAX / 2,
            ..ok_response()
        });

        h.executor.run_upload_attempt(1_000_000);
        assert_eq!(*h.transport.sent_batches.lock().unwrap(), vec![20]);
        assert_eq!(h.store.event_count(), 0);
    }
}
