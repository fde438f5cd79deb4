//! The analytics facade: event insertion, storage eviction, job routing,
//! and foreground wiring over the collaborator traits.
//!
//! Lifecycle is explicit: the host constructs [`Analytics`] at SDK startup
//! with its backends and drops it at teardown; no ambient global state.
//! The host's job runtime drives deferred work by calling
//! [`Analytics::perform_job`] when a scheduled job fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use er_common::{epoch_millis, Event, JobOutcome};
use er_config::{AnalyticsConfig, ConfigError};
use er_store::{EventStore, PreferenceStore};

use crate::activity::{ActivityListener, ForegroundTracker};
use crate::dispatch::{ConnectivityProbe, JobDispatcher};
use crate::policy;
use crate::schedule::ScheduleState;
use crate::scheduler::UploadScheduler;
use crate::transport::{
    AssociatedIdentifiers, ChannelRegistry, IdentifierProvider, Transport,
};
use crate::uploader::UploadExecutor;

/// Logical job name for the foreground identifier refresh.
pub const REFRESH_IDENTIFIERS_JOB: &str = "event-relay.refresh-identifiers";

/// Units of deferred work the pipeline performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Run one batch upload attempt.
    UploadEvents,
    /// Delete all locally stored events.
    DeleteAll,
    /// Refresh device/associated identifiers.
    RefreshIdentifiers,
}

/// Collaborator backends handed in by the host at startup.
pub struct Collaborators {
    pub store: Arc<dyn EventStore>,
    pub prefs: Arc<dyn PreferenceStore>,
    pub transport: Arc<dyn Transport>,
    pub dispatcher: Arc<dyn JobDispatcher>,
    pub connectivity: Arc<dyn ConnectivityProbe>,
    pub channel: Arc<dyn ChannelRegistry>,
    pub identifiers: Arc<dyn IdentifierProvider>,
}

/// Listener wired into the tracker: records foreground state for the
/// batching policy and kicks an identifier refresh on foreground.
struct PipelineListener {
    foreground: Arc<AtomicBool>,
    dispatcher: Arc<dyn JobDispatcher>,
}

impl ActivityListener for PipelineListener {
    fn on_foreground(&self, _timestamp_ms: u64) {
        self.foreground.store(true, Ordering::SeqCst);
        self.dispatcher
            .dispatch(REFRESH_IDENTIFIERS_JOB, Duration::from_millis(0));
    }

    fn on_background(&self, _timestamp_ms: u64) {
        self.foreground.store(false, Ordering::SeqCst);
    }
}

/// The client-side telemetry pipeline.
pub struct Analytics {
    config: AnalyticsConfig,
    store: Arc<dyn EventStore>,
    schedule: ScheduleState,
    scheduler: Arc<UploadScheduler>,
    executor: UploadExecutor,
    tracker: ForegroundTracker,
    foreground: Arc<AtomicBool>,
    identifier_provider: Arc<dyn IdentifierProvider>,
    identifiers: Mutex<AssociatedIdentifiers>,
}

impl Analytics {
    /// Build the pipeline and wire the foreground listener.
    pub fn new(config: AnalyticsConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;

        let schedule = ScheduleState::new(Arc::clone(&collaborators.prefs), &config);
        let scheduler = Arc::new(UploadScheduler::new(
            Arc::clone(&collaborators.dispatcher),
            Arc::clone(&collaborators.connectivity),
            schedule.clone(),
        ));
        let executor = UploadExecutor::new(
            Arc::clone(&collaborators.store),
            Arc::clone(&collaborators.transport),
            Arc::clone(&collaborators.channel),
            schedule.clone(),
            Arc::clone(&scheduler),
        );

        let tracker = ForegroundTracker::with_debounce_ms(config.background_debounce_ms);
        let foreground = Arc::new(AtomicBool::new(false));
        tracker.set_listener(Box::new(PipelineListener {
            foreground: Arc::clone(&foreground),
            dispatcher: Arc::clone(&collaborators.dispatcher),
        }));

        Ok(Analytics {
            config,
            store: collaborators.store,
            schedule,
            scheduler,
            executor,
            tracker,
            foreground,
            identifier_provider: collaborators.identifiers,
            identifiers: Mutex::new(AssociatedIdentifiers::default()),
        })
    }

    /// Track a surface start on the host's UI timeline.
    pub fn surface_started(&self, surface_id: u64, timestamp_ms: u64) {
        self.tracker.surface_started(surface_id, timestamp_ms);
    }

    /// Track a surface stop on the host's UI timeline.
    pub fn surface_stopped(&self, surface_id: u64, timestamp_ms: u64) {
        self.tracker.surface_stopped(surface_id, timestamp_ms);
    }

    /// Whether the app currently counts as foregrounded (debounced).
    pub fn is_foreground(&self) -> bool {
        self.foreground.load(Ordering::SeqCst)
    }

    /// Store an event and request an upload at its priority's delay.
    ///
    /// Malformed events are logged and dropped. If total stored bytes
    /// exceed the advised cap, the oldest complete session is evicted
    /// before insertion.
    pub fn add_event(&self, event: Event) {
        self.add_event_at(event, epoch_millis());
    }

    /// [`Analytics::add_event`] with an explicit wall-clock time.
    pub fn add_event_at(&self, event: Event, now_ms: u64) {
        if !event.is_well_formed() {
            warn!(event_type = %event.event_type, "dropping malformed event");
            return;
        }

        if self.store.total_size_bytes() > self.schedule.max_total_db_size_bytes() {
            info!("event store size exceeded, deleting oldest session");
            if let Some(session_id) = self.store.oldest_session_id() {
                self.store.delete_session(&session_id);
            }
        }

        if self.store.insert(&event) == 0 {
            error!(event_id = %event.id, "unable to insert event into store");
        }

        let delay_ms = policy::next_delay(
            event.priority,
            now_ms,
            &self.schedule.snapshot(),
            self.is_foreground(),
            self.config.background_reporting_interval_ms,
        );
        self.scheduler.request_upload(delay_ms, now_ms);
    }

    /// Delete all locally stored events.
    pub fn delete_all_events(&self) {
        info!("deleting all analytics events");
        self.store.delete_all();
    }

    /// Run one unit of deferred work. The host's job runtime calls this
    /// when a scheduled job fires and re-drives `Retry` outcomes.
    pub fn perform_job(&self, kind: JobKind) -> JobOutcome {
        debug!(?kind, "performing analytics job");
        match kind {
            JobKind::UploadEvents => self.executor.run_upload_attempt(epoch_millis()),
            JobKind::DeleteAll => {
                self.delete_all_events();
                JobOutcome::Finished
            }
            JobKind::RefreshIdentifiers => self.refresh_identifiers(),
        }
    }

    /// Current device/associated identifiers as last refreshed.
    pub fn associated_identifiers(&self) -> AssociatedIdentifiers {
        self.identifiers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn refresh_identifiers(&self) -> JobOutcome {
        let fresh = match self.identifier_provider.fetch() {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(error = %e, "failed to refresh associated identifiers");
                return JobOutcome::Retry;
            }
        };

        let mut current = self.identifiers.lock().unwrap_or_else(|e| e.into_inner());
        if *current != fresh {
            info!("associated identifiers updated");
            *current = fresh;
        }
        JobOutcome::Finished
    }

    #[cfg(test)]
    fn run_upload_attempt_at(&self, now_ms: u64) -> JobOutcome {
        self.executor.run_upload_attempt(now_ms)
    }
}
