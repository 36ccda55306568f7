//! Failure detector
//!
//! Aggregates attitude, altitude-rate, ESC, motor, imbalance, and
//! external fault inputs into debounced flags. Motor failure and
//! propeller imbalance additionally produce one-shot edges so a
//! configured reaction fires once rather than on every tick.

use uas_core_shared::hysteresis::Hysteresis;
use uas_core_shared::params::Parameters;
use uas_core_shared::sensors::{AttitudeSample, EscStatus, LocalPosition, VibrationMetrics};
use uas_core_shared::status::FailureFlags;
use uas_core_shared::time::{Duration, Timestamp};

/// Debounce interval for the external failure input
const EXTERNAL_DEBOUNCE: Duration = Duration::from_millis(100);
/// Debounce interval for the imbalance metric
const IMBALANCE_DEBOUNCE: Duration = Duration::from_millis(2_000);

/// Per-tick inputs of the detector
#[derive(Debug, Clone, Copy, Default)]
pub struct FailureDetectorInputs {
    /// Latest attitude estimate
    pub attitude: Option<AttitudeSample>,
    /// Latest local position estimate
    pub local_position: Option<LocalPosition>,
    /// Latest ESC status
    pub esc: Option<EscStatus>,
    /// Latest vibration summary
    pub vibration: Option<VibrationMetrics>,
    /// External failure input asserted
    pub external_trigger: bool,
    /// Motors enabled
    pub armed: bool,
    /// When the vehicle armed
    pub armed_at: Option<Timestamp>,
}

/// The failure detector with its per-flag debouncers
#[derive(Debug)]
pub struct FailureDetector {
    flags: FailureFlags,
    roll: Hysteresis,
    pitch: Hysteresis,
    alt: Hysteresis,
    ext: Hysteresis,
    imbalance: Hysteresis,
    motor_failure_prev: bool,
    motor_failure_edge: bool,
    imbalance_advisory: bool,
}

impl FailureDetector {
    /// A detector configured from the parameter snapshot
    pub fn new(params: &Parameters) -> Self {
        let attitude_debounce = Duration::from_secs_f32(params.fd_attitude_debounce);
        Self {
            flags: FailureFlags::default(),
            roll: Hysteresis::new(attitude_debounce),
            pitch: Hysteresis::new(attitude_debounce),
            alt: Hysteresis::new(attitude_debounce),
            ext: Hysteresis::new(EXTERNAL_DEBOUNCE),
            imbalance: Hysteresis::new(IMBALANCE_DEBOUNCE),
            motor_failure_prev: false,
            motor_failure_edge: false,
            imbalance_advisory: false,
        }
    }

    /// Re-apply debounce intervals after a parameter reload
    pub fn reconfigure(&mut self, params: &Parameters) {
        let attitude_debounce = Duration::from_secs_f32(params.fd_attitude_debounce);
        self.roll.set_time_to_true(attitude_debounce);
        self.pitch.set_time_to_true(attitude_debounce);
        self.alt.set_time_to_true(attitude_debounce);
    }

    /// Current flags
    pub const fn flags(&self) -> &FailureFlags {
        &self.flags
    }

    /// One-shot edge of the motor-failure mask changing to non-empty
    pub fn take_motor_failure_edge(&mut self) -> bool {
        std::mem::take(&mut self.motor_failure_edge)
    }

    /// One-shot advisory that the imbalance limit was crossed
    pub fn take_imbalance_advisory(&mut self) -> bool {
        std::mem::take(&mut self.imbalance_advisory)
    }

    /// Evaluate all inputs
    pub fn update(&mut self, params: &Parameters, inputs: &FailureDetectorInputs, now: Timestamp) {
        let max_roll = params.fd_max_roll_deg.to_radians();
        let max_pitch = params.fd_max_pitch_deg.to_radians();

        let (roll_over, pitch_over) = match inputs.attitude {
            Some(att) => (
                max_roll > 0.0 && att.roll.abs() > max_roll,
                max_pitch > 0.0 && att.pitch.abs() > max_pitch,
            ),
            None => (false, false),
        };
        self.flags.roll = self.roll.set_state_and_update(roll_over, now);
        self.flags.pitch = self.pitch.set_state_and_update(pitch_over, now);

        // Unintended descent: positive z velocity is downwards
        let descending_hard = params.fd_max_altitude_loss > 0.0
            && inputs
                .local_position
                .map(|pos| pos.v_z_valid && pos.vz > params.fd_max_altitude_loss)
                .unwrap_or(false);
        self.flags.alt = self.alt.set_state_and_update(inputs.armed && descending_hard, now);

        self.flags.ext = self.ext.set_state_and_update(inputs.external_trigger, now);

        self.update_esc(params, inputs, now);

        let imbalance_over = params.fd_imbalance_threshold > 0.0
            && inputs
                .vibration
                .map(|v| v.imbalance > params.fd_imbalance_threshold)
                .unwrap_or(false);
        let was_imbalanced = self.flags.imbalanced_prop;
        self.flags.imbalanced_prop = self.imbalance.set_state_and_update(imbalance_over, now);
        if self.flags.imbalanced_prop && !was_imbalanced {
            self.imbalance_advisory = true;
        }
    }

    /// Clear latched flight flags on disarm
    pub fn reset_on_disarm(&mut self, now: Timestamp) {
        self.flags.arm_esc = false;
        self.flags.motor_mask = 0;
        self.motor_failure_prev = false;
        self.alt.reset(false, now);
    }

    fn update_esc(&mut self, params: &Parameters, inputs: &FailureDetectorInputs, now: Timestamp) {
        let Some(esc) = inputs.esc else {
            return;
        };

        // ESCs must acknowledge arming within the spool-up window
        if inputs.armed {
            if let Some(armed_at) = inputs.armed_at {
                let window = Duration::from_secs_f32(params.fd_esc_timeout);
                let expected = if esc.esc_count >= 16 {
                    u16::MAX
                } else {
                    (1u16 << esc.esc_count) - 1
                };
                if now.elapsed_since(armed_at) > window && esc.armed_mask & expected != expected {
                    self.flags.arm_esc = true;
                }
            }
        }

        let motor_failed = esc.failure_mask != 0;
        self.flags.motor_mask = esc.failure_mask;
        if motor_failed && !self.motor_failure_prev {
            self.motor_failure_edge = true;
        }
        self.motor_failure_prev = motor_failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn inputs() -> FailureDetectorInputs {
        FailureDetectorInputs {
            armed: true,
            armed_at: Some(Timestamp::ZERO),
            ..Default::default()
        }
    }

    #[test]
    fn tilt_flag_needs_the_debounce_interval() {
        let params = Parameters::default();
        let mut detector = FailureDetector::new(&params);

        let mut input = inputs();
        input.attitude = Some(AttitudeSample {
            roll: 1.5,
            pitch: 0.0,
            timestamp: t(0),
        });
        detector.update(&params, &input, t(0));
        assert!(!detector.flags().roll);
        detector.update(&params, &input, t(150));
        assert!(!detector.flags().roll);
        detector.update(&params, &input, t(301));
        assert!(detector.flags().roll);
    }

    #[test]
    fn motor_failure_edge_fires_once() {
        let params = Parameters::default();
        let mut detector = FailureDetector::new(&params);

        let mut input = inputs();
        input.esc = Some(EscStatus {
            esc_count: 4,
            armed_mask: 0b1111,
            failure_mask: 0b0010,
            timestamp: t(0),
        });
        detector.update(&params, &input, t(0));
        assert!(detector.take_motor_failure_edge());
        detector.update(&params, &input, t(20));
        assert!(!detector.take_motor_failure_edge());
        assert!(detector.flags().motor_failure());
    }

    #[test]
    fn esc_arm_response_window() {
        let params = Parameters::default();
        let mut detector = FailureDetector::new(&params);

        let mut input = inputs();
        input.esc = Some(EscStatus {
            esc_count: 4,
            armed_mask: 0b0111,
            failure_mask: 0,
            timestamp: t(0),
        });
        // still inside the spool-up window
        detector.update(&params, &input, t(100));
        assert!(!detector.flags().arm_esc);
        // window elapsed with one ESC missing
        detector.update(&params, &input, t(400));
        assert!(detector.flags().arm_esc);
    }

    #[test]
    fn imbalance_advisory_is_single_shot() {
        let mut params = Parameters::default();
        params.fd_imbalance_threshold = 30.0;
        let mut detector = FailureDetector::new(&params);

        let mut input = inputs();
        input.vibration = Some(VibrationMetrics {
            imbalance: 45.0,
            timestamp: t(0),
        });
        detector.update(&params, &input, t(0));
        detector.update(&params, &input, t(2_500));
        assert!(detector.flags().imbalanced_prop);
        assert!(detector.take_imbalance_advisory());
        detector.update(&params, &input, t(3_000));
        assert!(!detector.take_imbalance_advisory());
    }

    #[test]
    fn disarm_clears_latched_esc_flags() {
        let params = Parameters::default();
        let mut detector = FailureDetector::new(&params);
        let mut input = inputs();
        input.esc = Some(EscStatus {
            esc_count: 4,
            armed_mask: 0,
            failure_mask: 0b0001,
            timestamp: t(0),
        });
        detector.update(&params, &input, t(500));
        assert!(detector.flags().arm_esc);
        detector.reset_on_disarm(t(600));
        assert!(!detector.flags().arm_esc);
        assert!(!detector.flags().motor_failure());
    }
}
