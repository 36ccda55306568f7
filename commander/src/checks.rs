//! Health and arming checks
//!
//! The checks reduce the current flag set to a pass/fail verdict per
//! candidate navigation state. The arm state machine consults the
//! verdict for the state the vehicle would actually fly in, so a vehicle
//! with no position estimate can still arm for a purely manual flight.

use uas_core_shared::status::StatusFlags;
use uas_core_shared::types::{NavState, VehicleType};

/// Pass/fail verdicts for every candidate navigation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    /// The mode-independent preflight checks pass
    pub prearm_ok: bool,
    mode_ok: [bool; NavState::ALL.len()],
}

impl HealthReport {
    /// Whether the given navigation state may be flown right now
    pub fn mode_ok(&self, state: NavState) -> bool {
        self.mode_ok[state.index()]
    }

    /// A report passing everything, for tests and forced paths
    pub fn all_pass() -> Self {
        Self {
            prearm_ok: true,
            mode_ok: [true; NavState::ALL.len()],
        }
    }
}

/// Evaluate the checks against the current flags
pub fn evaluate(flags: &StatusFlags, vehicle_type: VehicleType) -> HealthReport {
    let mut mode_ok = [false; NavState::ALL.len()];

    for state in NavState::ALL {
        mode_ok[state.index()] = match state {
            // Attitude-only modes need no estimates
            NavState::Manual | NavState::Stab | NavState::Acro => true,

            // Climb-rate control needs a vertical velocity estimate
            NavState::Altctl => flags.local_velocity_valid,

            NavState::Posctl => flags.local_position_valid && flags.local_velocity_valid,

            NavState::Offboard => !flags.offboard_control_signal_lost,

            NavState::Orbit
            | NavState::AutoLoiter
            | NavState::AutoMission
            | NavState::AutoFollowTarget => flags.global_position_valid,

            NavState::AutoRtl => flags.global_position_valid && flags.home_position_valid,

            NavState::AutoTakeoff | NavState::AutoVtolTakeoff => {
                flags.local_position_valid
                    && !(state == NavState::AutoVtolTakeoff
                        && !matches!(vehicle_type, VehicleType::Vtol))
            }

            NavState::AutoLand | NavState::AutoPrecland => flags.local_position_valid,

            // Failsafe-only states are always reachable
            NavState::Descend | NavState::Termination => true,
        };
    }

    HealthReport {
        prearm_ok: flags.pre_flight_checks_pass && !flags.calibration_enabled,
        mode_ok,
    }
}
