//! Main flight-mode state machine
//!
//! Accepts or refuses operator mode requests against the current flag
//! set. A refused request never changes state. The one soft spot is the
//! position-control request with a missing position estimate, which
//! falls back to altitude control when that is still possible.

use uas_core_shared::status::StatusFlags;
use uas_core_shared::types::{DenialReason, MainState, TransitionResult, VehicleType};

/// Inputs a mode decision depends on
#[derive(Debug, Clone, Copy)]
pub struct ModeContext {
    /// Current flag set
    pub flags: StatusFlags,
    /// The offboard stream has been continuously fresh long enough
    pub offboard_available: bool,
    /// A validated mission plan is loaded
    pub mission_valid: bool,
    /// Airframe class
    pub vehicle_type: VehicleType,
}

/// The main-state machine with its change counter
#[derive(Debug, Clone, Copy)]
pub struct MainStateMachine {
    state: MainState,
    changes: u64,
    operator_changed: bool,
}

impl MainStateMachine {
    /// A machine starting in manual flight
    pub fn new() -> Self {
        Self {
            state: MainState::Manual,
            changes: 0,
            operator_changed: false,
        }
    }

    /// Currently selected mode
    pub const fn state(&self) -> MainState {
        self.state
    }

    /// Count of accepted mode changes
    pub const fn changes(&self) -> u64 {
        self.changes
    }

    /// Whether any mode request was ever accepted this session
    pub const fn operator_changed(&self) -> bool {
        self.operator_changed
    }

    /// Install a mode without transition checks
    ///
    /// Used once at boot for the initial mode-slot assignment.
    pub fn force_install(&mut self, target: MainState) {
        if self.state != target {
            self.state = target;
            self.changes += 1;
        }
        self.operator_changed = true;
    }

    /// Attempt a transition to `target`
    pub fn try_set(&mut self, target: MainState, ctx: &ModeContext) -> TransitionResult {
        if self.state == target {
            self.operator_changed = true;
            return TransitionResult::NotChanged;
        }

        match Self::requirements_met(target, ctx) {
            Ok(()) => {
                self.install(target);
                TransitionResult::Changed
            }
            Err(reason) => {
                // Position control degrades to altitude control rather
                // than stranding the operator in the old mode
                if target == MainState::Posctl && ctx.flags.local_velocity_valid {
                    if self.state == MainState::Altctl {
                        return TransitionResult::NotChanged;
                    }
                    self.install(MainState::Altctl);
                    return TransitionResult::Changed;
                }
                TransitionResult::Denied(reason)
            }
        }
    }

    fn install(&mut self, target: MainState) {
        self.state = target;
        self.changes += 1;
        self.operator_changed = true;
    }

    fn requirements_met(target: MainState, ctx: &ModeContext) -> Result<(), DenialReason> {
        let flags = &ctx.flags;
        let ok = match target {
            MainState::Manual | MainState::Stab | MainState::Acro => true,
            MainState::Altctl => flags.local_velocity_valid,
            MainState::Posctl => flags.local_position_valid && flags.local_velocity_valid,
            MainState::AutoMission => {
                if !ctx.mission_valid {
                    return Err(DenialReason::TransitionForbidden);
                }
                flags.global_position_valid
            }
            MainState::AutoLoiter | MainState::AutoFollowTarget | MainState::Orbit => {
                flags.global_position_valid
            }
            MainState::AutoRtl => flags.global_position_valid && flags.home_position_valid,
            MainState::AutoTakeoff => flags.local_position_valid,
            MainState::AutoVtolTakeoff => {
                if ctx.vehicle_type != VehicleType::Vtol {
                    return Err(DenialReason::TransitionForbidden);
                }
                flags.local_position_valid
            }
            MainState::AutoLand | MainState::AutoPrecland => flags.local_position_valid,
            MainState::Offboard => {
                if !ctx.offboard_available {
                    return Err(DenialReason::OffboardSignalMissing);
                }
                true
            }
        };
        if ok {
            Ok(())
        } else {
            Err(DenialReason::EstimateMissing)
        }
    }
}

impl Default for MainStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(flags: &StatusFlags) -> ModeContext {
        ModeContext {
            flags: *flags,
            offboard_available: false,
            mission_valid: false,
            vehicle_type: VehicleType::RotaryWing,
        }
    }

    #[test]
    fn same_mode_does_not_bump_the_counter() {
        let flags = StatusFlags::default();
        let mut machine = MainStateMachine::new();
        assert_eq!(
            machine.try_set(MainState::Manual, &ctx(&flags)),
            TransitionResult::NotChanged
        );
        assert_eq!(machine.changes(), 0);
    }

    #[test]
    fn auto_modes_need_global_position() {
        let mut flags = StatusFlags::default();
        let mut machine = MainStateMachine::new();
        assert_eq!(
            machine.try_set(MainState::AutoLoiter, &ctx(&flags)),
            TransitionResult::Denied(DenialReason::EstimateMissing)
        );

        flags.global_position_valid = true;
        assert_eq!(
            machine.try_set(MainState::AutoLoiter, &ctx(&flags)),
            TransitionResult::Changed
        );
        assert_eq!(machine.changes(), 1);
    }

    #[test]
    fn posctl_falls_back_to_altctl() {
        let mut flags = StatusFlags::default();
        flags.local_velocity_valid = true;
        let mut machine = MainStateMachine::new();
        assert_eq!(
            machine.try_set(MainState::Posctl, &ctx(&flags)),
            TransitionResult::Changed
        );
        assert_eq!(machine.state(), MainState::Altctl);
    }

    #[test]
    fn posctl_without_any_estimate_is_denied() {
        let flags = StatusFlags::default();
        let mut machine = MainStateMachine::new();
        assert_eq!(
            machine.try_set(MainState::Posctl, &ctx(&flags)),
            TransitionResult::Denied(DenialReason::EstimateMissing)
        );
        assert_eq!(machine.state(), MainState::Manual);
    }

    #[test]
    fn offboard_needs_a_fresh_stream() {
        let flags = StatusFlags::default();
        let mut machine = MainStateMachine::new();
        assert_eq!(
            machine.try_set(MainState::Offboard, &ctx(&flags)),
            TransitionResult::Denied(DenialReason::OffboardSignalMissing)
        );

        let mut context = ctx(&flags);
        context.offboard_available = true;
        assert_eq!(
            machine.try_set(MainState::Offboard, &context),
            TransitionResult::Changed
        );
    }

    #[test]
    fn mission_mode_needs_a_valid_plan() {
        let mut flags = StatusFlags::default();
        flags.global_position_valid = true;
        let mut machine = MainStateMachine::new();
        assert_eq!(
            machine.try_set(MainState::AutoMission, &ctx(&flags)),
            TransitionResult::Denied(DenialReason::TransitionForbidden)
        );

        let mut context = ctx(&flags);
        context.mission_valid = true;
        assert_eq!(
            machine.try_set(MainState::AutoMission, &context),
            TransitionResult::Changed
        );
    }

    #[test]
    fn force_install_skips_all_checks() {
        let mut machine = MainStateMachine::new();
        assert!(!machine.operator_changed());
        machine.force_install(MainState::Posctl);
        assert_eq!(machine.state(), MainState::Posctl);
        assert!(machine.operator_changed());
    }
}
