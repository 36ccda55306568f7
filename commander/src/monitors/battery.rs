//! Battery supervision
//!
//! Only a warning level that worsens while armed triggers a failsafe
//! reaction, and only after the configured delay has elapsed without the
//! level recovering. Levels seen while disarmed merely update the flags.

use uas_core_shared::params::Parameters;
use uas_core_shared::sensors::BatteryStatus;
use uas_core_shared::time::{Duration, Timestamp};
use uas_core_shared::types::BatteryWarning;

/// Battery verdicts for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatteryState {
    /// Current warning level
    pub warning: BatteryWarning,
    /// The warning level worsened this tick
    pub worsened_edge: bool,
    /// A worsening is latched and its action delay has elapsed
    pub worsened_after_delay: bool,
    /// Level is at emergency
    pub emergency: bool,
}

/// The battery monitor
#[derive(Debug, Clone, Copy)]
pub struct BatteryMonitor {
    last_warning: BatteryWarning,
    worsened_at: Option<Timestamp>,
    state: BatteryState,
}

impl BatteryMonitor {
    /// A monitor starting at the nominal level
    pub fn new() -> Self {
        Self {
            last_warning: BatteryWarning::None,
            worsened_at: None,
            state: BatteryState::default(),
        }
    }

    /// Evaluate the latest battery record
    pub fn update(
        &mut self,
        params: &Parameters,
        battery: Option<&BatteryStatus>,
        armed: bool,
        now: Timestamp,
    ) -> BatteryState {
        let warning = battery.map(|b| b.warning).unwrap_or(self.last_warning);

        let worsened_edge = armed && warning > self.last_warning;
        if worsened_edge {
            self.worsened_at = Some(now);
        }
        if warning < self.last_warning || !armed {
            // recovery or disarm clears the pending reaction
            self.worsened_at = None;
        }
        self.last_warning = warning;

        let delay = Duration::from_secs_f32(params.battery_action_delay);
        let worsened_after_delay = self
            .worsened_at
            .map(|t| now.elapsed_since(t) >= delay)
            .unwrap_or(false);

        self.state = BatteryState {
            warning,
            worsened_edge,
            worsened_after_delay,
            emergency: warning == BatteryWarning::Emergency,
        };
        self.state
    }
}

impl Default for BatteryMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn battery(warning: BatteryWarning) -> BatteryStatus {
        BatteryStatus {
            warning,
            remaining: 0.5,
            remaining_time: None,
            timestamp: Timestamp::ZERO,
        }
    }

    #[test]
    fn worsening_while_armed_fires_after_the_delay() {
        let params = Parameters::default(); // 5 s delay
        let mut monitor = BatteryMonitor::new();

        let state = monitor.update(&params, Some(&battery(BatteryWarning::Low)), true, t(0));
        assert!(state.worsened_edge);
        assert!(!state.worsened_after_delay);

        let state = monitor.update(&params, Some(&battery(BatteryWarning::Low)), true, t(4_000));
        assert!(!state.worsened_after_delay);

        let state = monitor.update(&params, Some(&battery(BatteryWarning::Low)), true, t(5_000));
        assert!(state.worsened_after_delay);
    }

    #[test]
    fn worsening_while_disarmed_changes_nothing() {
        let params = Parameters::default();
        let mut monitor = BatteryMonitor::new();
        let state = monitor.update(
            &params,
            Some(&battery(BatteryWarning::Critical)),
            false,
            t(0),
        );
        assert!(!state.worsened_edge);
        let state = monitor.update(
            &params,
            Some(&battery(BatteryWarning::Critical)),
            false,
            t(10_000),
        );
        assert!(!state.worsened_after_delay);
        assert_eq!(state.warning, BatteryWarning::Critical);
    }

    #[test]
    fn recovery_clears_the_pending_reaction() {
        let params = Parameters::default();
        let mut monitor = BatteryMonitor::new();
        monitor.update(&params, Some(&battery(BatteryWarning::Low)), true, t(0));
        monitor.update(&params, Some(&battery(BatteryWarning::None)), true, t(1_000));
        let state = monitor.update(&params, Some(&battery(BatteryWarning::None)), true, t(9_000));
        assert!(!state.worsened_after_delay);
    }

    #[test]
    fn each_escalation_restarts_the_delay() {
        let params = Parameters::default();
        let mut monitor = BatteryMonitor::new();
        monitor.update(&params, Some(&battery(BatteryWarning::Low)), true, t(0));
        let state = monitor.update(
            &params,
            Some(&battery(BatteryWarning::Critical)),
            true,
            t(4_000),
        );
        assert!(state.worsened_edge);
        assert!(!state.worsened_after_delay);
        let state = monitor.update(
            &params,
            Some(&battery(BatteryWarning::Critical)),
            true,
            t(9_000),
        );
        assert!(state.worsened_after_delay);
        assert!(!state.emergency);
    }
}
