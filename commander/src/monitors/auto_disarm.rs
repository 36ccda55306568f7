//! Automatic disarm timers
//!
//! Two independent hysteresis timers: landed-for-N-seconds after a real
//! takeoff, and kill-switch-engaged-for-five-seconds. Each reports a
//! single disarm edge.

use uas_core_shared::hysteresis::Hysteresis;
use uas_core_shared::time::{Duration, Timestamp};

/// Hold time of the engaged kill switch before the vehicle disarms
pub const KILL_DISARM_DELAY: Duration = Duration::from_secs(5);

/// The auto-disarm timers
#[derive(Debug, Clone, Copy)]
pub struct AutoDisarm {
    landed: Hysteresis,
    kill: Hysteresis,
    landed_fired: bool,
    kill_fired: bool,
}

impl AutoDisarm {
    /// Timers for the given landed delay; zero disables the landed timer
    pub fn new(disarm_land_delay: Duration) -> Self {
        Self {
            landed: Hysteresis::new(disarm_land_delay),
            kill: Hysteresis::new(KILL_DISARM_DELAY),
            landed_fired: false,
            kill_fired: false,
        }
    }

    /// Update the landed delay after a parameter reload
    pub fn set_landed_delay(&mut self, delay: Duration) {
        self.landed.set_time_to_true(delay);
    }

    /// Feed the landed condition; `true` once when the timer fires
    ///
    /// The condition must include "has taken off since arming" so a
    /// freshly armed vehicle on the ground does not immediately disarm.
    pub fn update_landed(&mut self, landed_after_takeoff: bool, enabled: bool, now: Timestamp) -> bool {
        if !enabled {
            self.landed.reset(false, now);
            self.landed_fired = false;
            return false;
        }
        let state = self.landed.set_state_and_update(landed_after_takeoff, now);
        let fire = state && !self.landed_fired;
        self.landed_fired = state;
        fire
    }

    /// Feed the kill-switch condition; `true` once when the timer fires
    pub fn update_kill(&mut self, kill_engaged: bool, now: Timestamp) -> bool {
        let state = self.kill.set_state_and_update(kill_engaged, now);
        let fire = state && !self.kill_fired;
        self.kill_fired = state;
        fire
    }

    /// Clear both timers, e.g. after a disarm
    pub fn reset(&mut self, now: Timestamp) {
        self.landed.reset(false, now);
        self.kill.reset(false, now);
        self.landed_fired = false;
        self.kill_fired = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[test]
    fn landed_timer_fires_once_after_the_delay() {
        let mut timers = AutoDisarm::new(Duration::from_secs(2));
        assert!(!timers.update_landed(true, true, t(0)));
        assert!(!timers.update_landed(true, true, t(1_999)));
        assert!(timers.update_landed(true, true, t(2_000)));
        assert!(!timers.update_landed(true, true, t(2_100)));
    }

    #[test]
    fn one_airborne_tick_restarts_the_landed_timer() {
        let mut timers = AutoDisarm::new(Duration::from_secs(2));
        timers.update_landed(true, true, t(0));
        timers.update_landed(true, true, t(1_500));
        assert!(!timers.update_landed(false, true, t(1_600)));
        assert!(!timers.update_landed(true, true, t(1_700)));
        assert!(!timers.update_landed(true, true, t(3_600)));
        assert!(timers.update_landed(true, true, t(3_700)));
    }

    #[test]
    fn disabled_landed_timer_never_fires() {
        let mut timers = AutoDisarm::new(Duration::from_secs(2));
        assert!(!timers.update_landed(true, false, t(0)));
        assert!(!timers.update_landed(true, false, t(60_000)));
    }

    #[test]
    fn kill_timer_uses_the_fixed_delay() {
        let mut timers = AutoDisarm::new(Duration::from_secs(2));
        assert!(!timers.update_kill(true, t(0)));
        assert!(!timers.update_kill(true, t(4_999)));
        assert!(timers.update_kill(true, t(5_000)));
        assert!(!timers.update_kill(true, t(5_100)));
    }

    #[test]
    fn releasing_the_kill_switch_resets_the_timer() {
        let mut timers = AutoDisarm::new(Duration::from_secs(2));
        timers.update_kill(true, t(0));
        timers.update_kill(false, t(4_000));
        assert!(!timers.update_kill(true, t(8_000)));
        assert!(!timers.update_kill(true, t(12_999)));
        assert!(timers.update_kill(true, t(13_000)));
    }
}
