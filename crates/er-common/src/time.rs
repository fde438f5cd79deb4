//! Wall-clock helpers.
//!
//! Schedule arithmetic throughout the pipeline is done in epoch
//! milliseconds; core operations take `now_ms` as a parameter so they stay
//! deterministic under test, and callers use [`epoch_millis`] at the edge.

use chrono::Utc;

/// Current wall-clock time as epoch milliseconds.
pub fn epoch_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_millis_is_recent() {
        // Sanity: after 2020-01-01 and strictly increasing-ish.
        let a = epoch_millis();
        assert!(a > 1_577_836_800_000);
        let b = epoch_millis();
        assert!(b >= a);
    }
}
