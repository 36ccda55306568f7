//! Wind supervision
//!
//! Two thresholds: the warn level produces an operator event at most
//! once per quiet period, the hard limit requests a return.

use uas_core_shared::params::Parameters;
use uas_core_shared::sensors::WindSample;
use uas_core_shared::time::{Duration, Timestamp};

/// Quiet period between repeated wind warnings
const WARN_QUIET_PERIOD: Duration = Duration::from_secs(60);

/// Wind verdicts for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindState {
    /// Speed to announce in a warning this tick, if any
    pub warn_speed: Option<f32>,
    /// The hard limit is exceeded
    pub max_exceeded: bool,
}

/// The wind monitor
#[derive(Debug, Clone, Copy, Default)]
pub struct WindMonitor {
    last_warn_at: Option<Timestamp>,
}

impl WindMonitor {
    /// A quiet monitor
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate the latest wind estimate
    pub fn update(
        &mut self,
        params: &Parameters,
        wind: Option<&WindSample>,
        now: Timestamp,
    ) -> WindState {
        let Some(speed) = wind.map(|w| w.speed()) else {
            return WindState::default();
        };

        let max_exceeded = params.wind_max_threshold > 0.0 && speed > params.wind_max_threshold;

        let warn_level = params.wind_warn_threshold > 0.0 && speed > params.wind_warn_threshold;
        let quiet_over = self
            .last_warn_at
            .map(|t| now.elapsed_since(t) >= WARN_QUIET_PERIOD)
            .unwrap_or(true);
        let warn_speed = if warn_level && quiet_over {
            self.last_warn_at = Some(now);
            Some(speed)
        } else {
            None
        };

        WindState {
            warn_speed,
            max_exceeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: u64) -> Timestamp {
        Timestamp::from_secs(s)
    }

    fn wind(speed: f32) -> WindSample {
        WindSample {
            north: speed,
            east: 0.0,
            timestamp: Timestamp::ZERO,
        }
    }

    fn params() -> Parameters {
        let mut params = Parameters::default();
        params.wind_warn_threshold = 8.0;
        params.wind_max_threshold = 12.0;
        params
    }

    #[test]
    fn warning_respects_the_quiet_period() {
        let params = params();
        let mut monitor = WindMonitor::new();

        let state = monitor.update(&params, Some(&wind(9.0)), t(0));
        assert!(state.warn_speed.is_some());

        let state = monitor.update(&params, Some(&wind(9.5)), t(30));
        assert!(state.warn_speed.is_none());

        let state = monitor.update(&params, Some(&wind(9.5)), t(61));
        assert!(state.warn_speed.is_some());
    }

    #[test]
    fn hard_limit_requests_a_return_every_tick() {
        let params = params();
        let mut monitor = WindMonitor::new();
        let state = monitor.update(&params, Some(&wind(13.0)), t(0));
        assert!(state.max_exceeded);
        let state = monitor.update(&params, Some(&wind(13.0)), t(1));
        assert!(state.max_exceeded);
    }

    #[test]
    fn disabled_thresholds_never_fire() {
        let params = Parameters::default();
        let mut monitor = WindMonitor::new();
        let state = monitor.update(&params, Some(&wind(40.0)), t(0));
        assert!(state.warn_speed.is_none());
        assert!(!state.max_exceeded);
    }
}
