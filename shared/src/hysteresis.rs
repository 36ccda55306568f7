//! Debounced boolean conditions
//!
//! A [`Hysteresis`] only reports a state change once the requested state
//! has held continuously for the configured interval. A single tick of
//! the opposite condition restarts the interval.

use crate::time::{Duration, Timestamp};

/// A parameterised boolean debouncer
#[derive(Debug, Clone, Copy)]
pub struct Hysteresis {
    state: bool,
    requested: bool,
    requested_at: Timestamp,
    time_to_true: Duration,
    time_to_false: Duration,
}

impl Hysteresis {
    /// A debouncer starting `false` that needs `time_to_true` of
    /// continuous truth before reporting `true`; falls back immediately
    pub fn new(time_to_true: Duration) -> Self {
        Self {
            state: false,
            requested: false,
            requested_at: Timestamp::ZERO,
            time_to_true,
            time_to_false: Duration::ZERO,
        }
    }

    /// Also debounce the falling edge
    pub fn with_time_to_false(mut self, time_to_false: Duration) -> Self {
        self.time_to_false = time_to_false;
        self
    }

    /// Replace the rising-edge interval, keeping current state
    pub fn set_time_to_true(&mut self, time_to_true: Duration) {
        self.time_to_true = time_to_true;
    }

    /// Feed the current condition and report the debounced state
    pub fn set_state_and_update(&mut self, condition: bool, now: Timestamp) -> bool {
        if condition != self.requested {
            self.requested = condition;
            self.requested_at = now;
        }
        if self.requested != self.state {
            let hold = now.elapsed_since(self.requested_at);
            let needed = if self.requested {
                self.time_to_true
            } else {
                self.time_to_false
            };
            if hold >= needed {
                self.state = self.requested;
            }
        }
        self.state
    }

    /// The debounced state without feeding a new condition
    pub const fn get_state(&self) -> bool {
        self.state
    }

    /// Force the state, clearing any pending change
    pub fn reset(&mut self, state: bool, now: Timestamp) {
        self.state = state;
        self.requested = state;
        self.requested_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[test]
    fn reports_true_only_after_the_interval() {
        let mut h = Hysteresis::new(Duration::from_millis(2_000));
        assert!(!h.set_state_and_update(true, t(0)));
        assert!(!h.set_state_and_update(true, t(1_999)));
        assert!(h.set_state_and_update(true, t(2_000)));
    }

    #[test]
    fn a_single_opposite_tick_restarts_the_interval() {
        let mut h = Hysteresis::new(Duration::from_millis(2_000));
        h.set_state_and_update(true, t(0));
        h.set_state_and_update(true, t(1_500));
        // one tick of false resets the accumulated hold
        h.set_state_and_update(false, t(1_600));
        assert!(!h.set_state_and_update(true, t(1_700)));
        assert!(!h.set_state_and_update(true, t(3_600)));
        assert!(h.set_state_and_update(true, t(3_700)));
    }

    #[test]
    fn falls_back_immediately_by_default() {
        let mut h = Hysteresis::new(Duration::from_millis(100));
        h.set_state_and_update(true, t(0));
        assert!(h.set_state_and_update(true, t(100)));
        assert!(!h.set_state_and_update(false, t(101)));
    }

    #[test]
    fn falling_edge_can_be_debounced_too() {
        let mut h = Hysteresis::new(Duration::from_millis(100))
            .with_time_to_false(Duration::from_millis(300));
        h.set_state_and_update(true, t(0));
        assert!(h.set_state_and_update(true, t(100)));
        assert!(h.set_state_and_update(false, t(150)));
        assert!(h.set_state_and_update(false, t(449)));
        assert!(!h.set_state_and_update(false, t(450)));
    }

    #[test]
    fn reset_clears_pending_changes() {
        let mut h = Hysteresis::new(Duration::from_millis(1_000));
        h.set_state_and_update(true, t(0));
        h.reset(false, t(500));
        assert!(!h.set_state_and_update(true, t(600)));
        assert!(!h.set_state_and_update(true, t(1_599)));
        assert!(h.set_state_and_update(true, t(1_600)));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// The state is true exactly when the condition has held for
            /// the configured interval, whatever the sampling pattern
            #[test]
            fn true_exactly_after_the_interval(
                interval_ms in 1u64..10_000,
                mut sample_times in proptest::collection::vec(0u64..60_000u64, 1..50),
            ) {
                sample_times.sort_unstable();
                let start = sample_times[0];
                let mut h = Hysteresis::new(Duration::from_millis(interval_ms));
                for now in sample_times {
                    let state = h.set_state_and_update(true, t(now));
                    prop_assert_eq!(state, now - start >= interval_ms);
                }
            }
        }
    }
}
