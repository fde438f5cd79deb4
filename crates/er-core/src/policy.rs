//! Batching policy: delay computation before the next upload attempt.
//!
//! Pure functions only — the scheduler owns the side effects. All delay
//! floors combine via `max`, never additively: the policy picks the longest
//! applicable constraint.

use er_common::Priority;

/// Batch delay for high priority events (ms). Urgent events bypass
/// throttling entirely.
pub const HIGH_PRIORITY_BATCH_DELAY_MS: u64 = 1_000;

/// Batch delay floor for normal priority events (ms).
pub const NORMAL_PRIORITY_BATCH_DELAY_MS: u64 = 10_000;

/// Batch delay floor for low priority events (ms).
pub const LOW_PRIORITY_BATCH_DELAY_MS: u64 = 30_000;

/// Hard cap on events per upload batch, regardless of byte budget.
pub const MAX_BATCH_EVENT_COUNT: usize = 500;

/// The two persisted scalars the delay computation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSnapshot {
    /// Wall-clock time of the last upload attempt (epoch ms, 0 = never).
    pub last_send_at_ms: u64,
    /// Server-advised minimum interval between uploads (ms).
    pub min_batch_interval_ms: u64,
}

impl ScheduleSnapshot {
    /// Time remaining until the minimum batch interval has elapsed since
    /// the last send. Zero once the interval has passed.
    pub fn time_until_min_interval(&self, now_ms: u64) -> u64 {
        self.last_send_at_ms
            .saturating_add(self.min_batch_interval_ms)
            .saturating_sub(now_ms)
    }
}

/// Target delay before the next upload attempt for an event of `priority`.
///
/// `is_foreground` and `background_reporting_interval_ms` only matter for
/// LOW priority: backgrounded LOW events are additionally throttled to the
/// application-supplied background reporting interval.
pub fn next_delay(
    priority: Priority,
    now_ms: u64,
    schedule: &ScheduleSnapshot,
    is_foreground: bool,
    background_reporting_interval_ms: u64,
) -> u64 {
    let interval_floor = schedule.time_until_min_interval(now_ms);

    match priority {
        Priority::High => HIGH_PRIORITY_BATCH_DELAY_MS,
        Priority::Normal => interval_floor.max(NORMAL_PRIORITY_BATCH_DELAY_MS),
        Priority::Low => {
            if is_foreground {
                interval_floor.max(LOW_PRIORITY_BATCH_DELAY_MS)
            } else {
                let since_last_send = now_ms.saturating_sub(schedule.last_send_at_ms);
                let background_throttle =
                    background_reporting_interval_ms.saturating_sub(since_last_send);
                background_throttle
                    .max(interval_floor)
                    .max(LOW_PRIORITY_BATCH_DELAY_MS)
            }
        }
    }
}
