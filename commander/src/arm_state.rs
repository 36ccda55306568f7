//! Arm state machine
//!
//! Five regular lifecycle states plus the transient in-air-restore state.
//! Every attempt returns whether the machine changed, stayed put, or
//! refused, and a refusal never mutates state. The caller is responsible
//! for the audible cue and the structured event on a refusal.

use uas_core_shared::sensors::ManualControl;
use uas_core_shared::types::{
    ArmingState, DenialReason, GeofenceAction, MainState, TransitionResult, VehicleType,
};

use crate::checks::HealthReport;

/// Everything an arming decision depends on
#[derive(Debug, Clone, Copy)]
pub struct ArmContext<'a> {
    /// Current health verdicts
    pub report: &'a HealthReport,
    /// Navigation state the vehicle would fly in after arming
    pub nav_state: uas_core_shared::types::NavState,
    /// Currently selected main mode
    pub main_state: MainState,
    /// Airframe class
    pub vehicle_type: VehicleType,
    /// Land detector verdict
    pub landed: bool,
    /// Skip the health gates
    pub forced: bool,
    /// The request came from an RC input
    pub from_rc: bool,
    /// Latest stick positions
    pub sticks: ManualControl,
    /// Configured geofence reaction
    pub geofence_action: GeofenceAction,
    /// A usable home position exists
    pub home_valid: bool,
    /// The termination output is latched
    pub termination_latched: bool,
    /// A calibration routine is running
    pub calibration_active: bool,
}

/// The arm state machine
#[derive(Debug, Clone, Copy)]
pub struct ArmStateMachine {
    state: ArmingState,
}

impl ArmStateMachine {
    /// A machine starting in the boot state
    pub fn new() -> Self {
        Self {
            state: ArmingState::Init,
        }
    }

    /// Current state
    pub const fn state(&self) -> ArmingState {
        self.state
    }

    /// Attempt a transition to `target`
    pub fn request(&mut self, target: ArmingState, ctx: &ArmContext<'_>) -> TransitionResult {
        if self.state == target {
            return TransitionResult::NotChanged;
        }

        let verdict = match (self.state, target) {
            (ArmingState::Init, ArmingState::Standby) => {
                if ctx.report.prearm_ok {
                    Ok(())
                } else {
                    Err(DenialReason::HealthChecksFailed)
                }
            }
            (ArmingState::Init, ArmingState::StandbyError)
            | (ArmingState::Standby, ArmingState::StandbyError) => Ok(()),
            (ArmingState::StandbyError, ArmingState::Standby) => {
                if ctx.report.prearm_ok {
                    Ok(())
                } else {
                    Err(DenialReason::HealthChecksFailed)
                }
            }
            (ArmingState::Standby, ArmingState::Armed) => self.check_arm(ctx),
            // A forced arm may leave the boot state directly, e.g. after
            // a brown-out restart with checks that will never pass again
            (ArmingState::Init, ArmingState::Armed) if ctx.forced => self.check_arm(ctx),
            (ArmingState::Armed, ArmingState::Standby) => {
                let manual_thrust_rotary = ctx.vehicle_type == VehicleType::RotaryWing
                    && matches!(
                        ctx.main_state,
                        MainState::Manual | MainState::Acro | MainState::Stab
                    );
                if ctx.landed || ctx.forced || manual_thrust_rotary {
                    Ok(())
                } else {
                    Err(DenialReason::NotLanded)
                }
            }
            (
                ArmingState::Init | ArmingState::Standby | ArmingState::StandbyError,
                ArmingState::Shutdown,
            ) => Ok(()),
            (ArmingState::Init, ArmingState::InAirRestore) => Ok(()),
            (ArmingState::InAirRestore, ArmingState::Armed) => {
                if ctx.termination_latched {
                    Err(DenialReason::TerminationLatched)
                } else {
                    Ok(())
                }
            }
            (ArmingState::InAirRestore, ArmingState::Standby) => Ok(()),
            _ => Err(DenialReason::TransitionForbidden),
        };

        match verdict {
            Ok(()) => {
                self.state = target;
                TransitionResult::Changed
            }
            Err(reason) => TransitionResult::Denied(reason),
        }
    }

    /// Whether a shutdown request may proceed from the current state
    pub fn shutdown_allowed(&self) -> bool {
        !matches!(self.state, ArmingState::Armed | ArmingState::InAirRestore)
    }

    fn check_arm(&self, ctx: &ArmContext<'_>) -> Result<(), DenialReason> {
        // The termination latch holds regardless of force
        if ctx.termination_latched {
            return Err(DenialReason::TerminationLatched);
        }

        // A geofence return action is useless without home, forced or not
        if ctx.geofence_action == GeofenceAction::ReturnToLaunch && !ctx.home_valid {
            return Err(DenialReason::HomeRequired);
        }

        if ctx.forced {
            return Ok(());
        }

        if ctx.calibration_active {
            return Err(DenialReason::CalibrationActive);
        }

        if !(ctx.report.prearm_ok && ctx.report.mode_ok(ctx.nav_state)) {
            return Err(DenialReason::HealthChecksFailed);
        }

        // Climb-rate modes hold altitude at centre throttle; arming above
        // centre would command an immediate climb
        if ctx.main_state.is_climb_rate_mode() && ctx.sticks.throttle_above_centre() {
            return Err(DenialReason::ThrottleAboveCentre);
        }

        // Direct-thrust manual modes spin up with the stick, so it must
        // rest at the floor (rovers drive off from any stick position)
        if ctx.main_state.is_manual()
            && !ctx.main_state.is_climb_rate_mode()
            && !ctx.vehicle_type.is_ground_vehicle()
            && !ctx.sticks.throttle_idle()
        {
            return Err(DenialReason::ThrottleNotIdle);
        }

        // RC arming gestures only make sense while flying a manual mode
        if ctx.from_rc && !ctx.main_state.is_manual() {
            return Err(DenialReason::NotInManualMode);
        }

        Ok(())
    }
}

impl Default for ArmStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
