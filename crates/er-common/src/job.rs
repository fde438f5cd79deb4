//! Job outcome signaling for deferred work.

use serde::{Deserialize, Serialize};

/// Result of one unit of deferred work.
///
/// `Retry` asks the job runtime to re-drive the same unit of work later;
/// backoff policy between retries belongs to the runtime, not the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    /// Work completed (or was a deliberate no-op); do not re-run.
    Finished,
    /// Transient failure; the runtime should re-attempt this work.
    Retry,
}
