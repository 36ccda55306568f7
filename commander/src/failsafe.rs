//! Failsafe resolver
//!
//! A pure priority decision: given the selected main state and every
//! debounced trigger, produce the navigation state the vehicle must
//! actually fly, the cause when a trigger overrode the operator, and
//! whether the motors must be locked down. The caller latches one-shot
//! triggers and coalesces repeated decisions with the same cause.

use uas_core_shared::params::Parameters;
use uas_core_shared::status::FailsafeCause;
use uas_core_shared::types::{
    BatteryWarning, FailsafeAction, GeofenceAction, MainState, NavState, OffboardRcAction,
    VehicleType,
};

/// Everything one failsafe decision depends on
#[derive(Debug, Clone, Copy)]
pub struct FailsafeInputs {
    /// Currently selected main mode
    pub main_state: MainState,
    /// Airframe class
    pub vehicle_type: VehicleType,
    /// Motors enabled
    pub armed: bool,
    /// The vehicle is on the ground
    pub landed: bool,
    /// The termination output is latched
    pub force_failsafe: bool,
    /// The mission demanded flight termination
    pub mission_termination: bool,
    /// Critical attitude failure inside the post-takeoff lockdown window
    pub early_takeoff_failure: bool,
    /// Current battery warning level
    pub battery_warning: BatteryWarning,
    /// The warning level worsened while armed and the delay elapsed
    pub battery_worsened: bool,
    /// Ground station link lost beyond the threshold
    pub data_link_lost: bool,
    /// Manual control link lost
    pub rc_lost: bool,
    /// Offboard stream lost
    pub offboard_lost: bool,
    /// A geofence breach is latched
    pub geofence_breached: bool,
    /// Maximum flight time reached
    pub max_flight_time_exceeded: bool,
    /// Predicted remaining battery flight time too low
    pub low_remaining_time: bool,
    /// Wind above the hard limit
    pub high_wind: bool,
    /// VTOL transition failure requests a quadchute
    pub quadchute: bool,
    /// A usable home position exists
    pub home_valid: bool,
    /// Global position estimate acceptable
    pub global_position_valid: bool,
    /// Local position estimate acceptable
    pub local_position_valid: bool,
}

/// Outcome of one resolver pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailsafeDecision {
    /// Navigation state the vehicle must fly
    pub nav_state: NavState,
    /// Which trigger overrode the operator, if any
    pub cause: Option<FailsafeCause>,
    /// Motors must be locked down
    pub lockdown: bool,
}

/// Resolve the navigation state for the current tick
pub fn resolve(params: &Parameters, inputs: &FailsafeInputs) -> FailsafeDecision {
    let fallback = inputs.main_state.default_nav_state();

    let keep = |cause| FailsafeDecision {
        nav_state: fallback,
        cause,
        lockdown: false,
    };

    let termination_enabled = !params.cb_flight_termination;

    // 1. Termination outputs dominate everything
    if termination_enabled {
        if inputs.force_failsafe {
            return FailsafeDecision {
                nav_state: NavState::Termination,
                cause: Some(FailsafeCause::FlightTermination),
                lockdown: false,
            };
        }
        if inputs.mission_termination {
            return FailsafeDecision {
                nav_state: NavState::Termination,
                cause: Some(FailsafeCause::MissionTermination),
                lockdown: false,
            };
        }
        // 2. Geofence breach with the terminate action
        if inputs.geofence_breached && params.geofence_action == GeofenceAction::Terminate {
            return FailsafeDecision {
                nav_state: NavState::Termination,
                cause: Some(FailsafeCause::GeofenceTermination),
                lockdown: false,
            };
        }
    }

    // 3. Critical failure right after takeoff: motors off beats any
    // attempt at an automatic recovery this close to the ground
    if inputs.early_takeoff_failure {
        return FailsafeDecision {
            nav_state: fallback,
            cause: Some(FailsafeCause::EarlyTakeoffFailure),
            lockdown: true,
        };
    }

    if !inputs.armed {
        return keep(None);
    }

    // 4. Battery emergency: land immediately, shutdown follows on ground
    if inputs.battery_warning == BatteryWarning::Emergency && !inputs.landed {
        return apply_action(FailsafeAction::Land, FailsafeCause::BatteryEmergency, inputs)
            .unwrap_or(keep(Some(FailsafeCause::BatteryEmergency)));
    }

    // 5. Battery warning level worsened
    if inputs.battery_worsened {
        if let Some(decision) =
            apply_action(params.battery_action, FailsafeCause::BatteryLevel, inputs)
        {
            return decision;
        }
    }

    // 6. Ground station link loss; a manually flown vehicle with a live
    // stick link keeps flying
    if inputs.data_link_lost && !(inputs.main_state.is_manual() && !inputs.rc_lost) {
        if let Some(decision) =
            apply_action(params.datalink_loss_action, FailsafeCause::DataLinkLoss, inputs)
        {
            return decision;
        }
    }

    // 7. Manual control link loss, subject to the exception mask
    if inputs.rc_lost {
        let excepted = (params.rc_loss_except_auto && inputs.main_state.is_auto())
            || (params.rc_loss_except_offboard && inputs.main_state == MainState::Offboard);
        if !excepted {
            if let Some(decision) =
                apply_action(params.rc_loss_action, FailsafeCause::RcLoss, inputs)
            {
                return decision;
            }
        }
    }

    // 8. Offboard stream loss while in offboard mode
    if inputs.offboard_lost && inputs.main_state == MainState::Offboard {
        let decision = if !inputs.rc_lost {
            offboard_rc_fallback(params.offboard_loss_rc_action, inputs)
        } else {
            apply_action(params.offboard_loss_action, FailsafeCause::OffboardLoss, inputs)
        };
        if let Some(decision) = decision {
            return decision;
        }
    }

    // 9. Geofence breach with a recoverable action
    if inputs.geofence_breached {
        let action = match params.geofence_action {
            GeofenceAction::Hold => Some(FailsafeAction::Hold),
            GeofenceAction::ReturnToLaunch => Some(FailsafeAction::ReturnToLaunch),
            GeofenceAction::Land => Some(FailsafeAction::Land),
            GeofenceAction::None | GeofenceAction::Warn | GeofenceAction::Terminate => None,
        };
        if let Some(action) = action {
            if let Some(decision) =
                apply_action(action, FailsafeCause::GeofenceViolation, inputs)
            {
                return decision;
            }
        }
    }

    // 10./11. Flight-time and wind limits force a return; an explicit
    // landing wins over the return
    let timed_return = inputs.max_flight_time_exceeded || inputs.low_remaining_time;
    if timed_return || inputs.high_wind {
        let cause = if inputs.high_wind && !timed_return {
            FailsafeCause::HighWind
        } else if inputs.max_flight_time_exceeded {
            FailsafeCause::MaxFlightTime
        } else {
            FailsafeCause::LowRemainingFlightTime
        };
        if matches!(
            inputs.main_state,
            MainState::AutoLand | MainState::AutoPrecland
        ) {
            return keep(None);
        }
        if let Some(decision) = apply_action(FailsafeAction::ReturnToLaunch, cause, inputs) {
            return decision;
        }
    }

    // 12. VTOL quadchute
    if inputs.quadchute && inputs.vehicle_type == VehicleType::Vtol {
        if let Some(decision) =
            apply_action(params.quadchute_action, FailsafeCause::Quadchute, inputs)
        {
            return decision;
        }
    }

    keep(None)
}

/// Map a configured action to a decision, degrading when the estimates
/// the action needs are missing. `None` means the trigger changes nothing.
fn apply_action(
    action: FailsafeAction,
    cause: FailsafeCause,
    inputs: &FailsafeInputs,
) -> Option<FailsafeDecision> {
    let with_nav = |nav_state| {
        Some(FailsafeDecision {
            nav_state,
            cause: Some(cause),
            lockdown: false,
        })
    };

    match action {
        FailsafeAction::None | FailsafeAction::Warn => None,
        FailsafeAction::Hold => {
            if inputs.global_position_valid {
                with_nav(NavState::AutoLoiter)
            } else {
                with_nav(NavState::Descend)
            }
        }
        FailsafeAction::ReturnToLaunch => {
            if inputs.global_position_valid && inputs.home_valid {
                with_nav(NavState::AutoRtl)
            } else if inputs.local_position_valid {
                with_nav(NavState::AutoLand)
            } else {
                with_nav(NavState::Descend)
            }
        }
        FailsafeAction::Land => {
            if inputs.local_position_valid {
                with_nav(NavState::AutoLand)
            } else {
                with_nav(NavState::Descend)
            }
        }
        FailsafeAction::Descend => with_nav(NavState::Descend),
        FailsafeAction::Terminate => with_nav(NavState::Termination),
        FailsafeAction::Lockdown => Some(FailsafeDecision {
            nav_state: inputs.main_state.default_nav_state(),
            cause: Some(cause),
            lockdown: true,
        }),
    }
}

/// Offboard loss with a live manual link: hand the vehicle back to the
/// operator in the configured manual flavour
fn offboard_rc_fallback(
    action: OffboardRcAction,
    inputs: &FailsafeInputs,
) -> Option<FailsafeDecision> {
    let nav_state = match action {
        OffboardRcAction::Position => {
            if inputs.local_position_valid {
                NavState::Posctl
            } else {
                NavState::Altctl
            }
        }
        OffboardRcAction::Altitude => NavState::Altctl,
        OffboardRcAction::Manual => NavState::Manual,
        OffboardRcAction::ReturnToLaunch => {
            return apply_action(
                FailsafeAction::ReturnToLaunch,
                FailsafeCause::OffboardLoss,
                inputs,
            )
        }
        OffboardRcAction::Land => {
            return apply_action(FailsafeAction::Land, FailsafeCause::OffboardLoss, inputs)
        }
        OffboardRcAction::Hold => {
            return apply_action(FailsafeAction::Hold, FailsafeCause::OffboardLoss, inputs)
        }
    };
    Some(FailsafeDecision {
        nav_state,
        cause: Some(FailsafeCause::OffboardLoss),
        lockdown: false,
    })
}
