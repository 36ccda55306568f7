//! Control-mode and LED derivation
//!
//! Pure tables from the resolved navigation state to the control loops
//! the downstream controllers must run, and from the overall status to
//! the LED colour the operator sees.

use uas_core_shared::events::{LedColor, LedControl, LedMode};
use uas_core_shared::status::{ActuatorArmed, VehicleControlMode};
use uas_core_shared::time::Timestamp;
use uas_core_shared::types::{ArmingState, BatteryWarning, NavState};

/// CPU load above which the overload colour wins
const OVERLOAD_THRESHOLD: f32 = 0.95;

/// Control loops for the given navigation state
pub fn control_mode_for(nav_state: NavState, armed: &ActuatorArmed) -> VehicleControlMode {
    let mut mode = VehicleControlMode {
        armed: armed.armed && !armed.lockdown && !armed.manual_lockdown && !armed.force_failsafe,
        ..Default::default()
    };

    match nav_state {
        NavState::Manual => {
            mode.manual_control = true;
            mode.rates_control = true;
            mode.attitude_control = true;
        }
        NavState::Acro => {
            mode.manual_control = true;
            mode.rates_control = true;
        }
        NavState::Stab => {
            mode.manual_control = true;
            mode.rates_control = true;
            mode.attitude_control = true;
        }
        NavState::Altctl => {
            mode.manual_control = true;
            mode.rates_control = true;
            mode.attitude_control = true;
            mode.altitude_control = true;
        }
        NavState::Posctl => {
            mode.manual_control = true;
            mode.rates_control = true;
            mode.attitude_control = true;
            mode.altitude_control = true;
            mode.position_control = true;
            mode.velocity_control = true;
        }
        NavState::Offboard => {
            mode.offboard_control = true;
            mode.rates_control = true;
            mode.attitude_control = true;
            mode.altitude_control = true;
            mode.position_control = true;
            mode.velocity_control = true;
        }
        NavState::Orbit
        | NavState::AutoTakeoff
        | NavState::AutoVtolTakeoff
        | NavState::AutoLoiter
        | NavState::AutoMission
        | NavState::AutoRtl
        | NavState::AutoLand
        | NavState::AutoPrecland
        | NavState::AutoFollowTarget => {
            mode.rates_control = true;
            mode.attitude_control = true;
            mode.altitude_control = true;
            mode.position_control = true;
            mode.velocity_control = true;
        }
        NavState::Descend => {
            mode.rates_control = true;
            mode.attitude_control = true;
            mode.altitude_control = true;
        }
        NavState::Termination => {
            mode.termination = true;
            mode.armed = false;
        }
    }

    mode
}

/// Inputs of the LED selection
#[derive(Debug, Clone, Copy)]
pub struct LedInputs {
    /// Motor-enablement lifecycle state
    pub arming_state: ArmingState,
    /// A failsafe currently overrides the operator
    pub failsafe: bool,
    /// Battery warning level
    pub battery_warning: BatteryWarning,
    /// A usable home position exists
    pub home_valid: bool,
    /// CPU load fraction
    pub cpu_load: f32,
}

/// LED state the operator sees for the given situation
pub fn led_for(inputs: &LedInputs, now: Timestamp) -> LedControl {
    let (color, mode) = if inputs.cpu_load > OVERLOAD_THRESHOLD {
        (LedColor::Purple, LedMode::BlinkFast)
    } else if inputs.battery_warning >= BatteryWarning::Critical {
        (LedColor::Red, LedMode::BlinkFast)
    } else if inputs.failsafe {
        (LedColor::Purple, LedMode::BlinkSlow)
    } else if inputs.battery_warning == BatteryWarning::Low {
        (LedColor::Amber, LedMode::Breathe)
    } else {
        match inputs.arming_state {
            ArmingState::Armed => (LedColor::Green, LedMode::On),
            ArmingState::Standby => {
                if inputs.home_valid {
                    (LedColor::Green, LedMode::Breathe)
                } else {
                    (LedColor::Blue, LedMode::Breathe)
                }
            }
            ArmingState::StandbyError => (LedColor::Red, LedMode::BlinkSlow),
            ArmingState::Shutdown => (LedColor::Off, LedMode::On),
            ArmingState::Init | ArmingState::InAirRestore => (LedColor::White, LedMode::Breathe),
        }
    };

    LedControl {
        color,
        mode,
        timestamp: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_mode_has_no_position_loop() {
        let armed = ActuatorArmed {
            armed: true,
            ..Default::default()
        };
        let mode = control_mode_for(NavState::Manual, &armed);
        assert!(mode.armed);
        assert!(mode.manual_control);
        assert!(!mode.position_control);
    }

    #[test]
    fn lockdown_overrides_the_armed_flag() {
        let armed = ActuatorArmed {
            armed: true,
            lockdown: true,
            ..Default::default()
        };
        let mode = control_mode_for(NavState::AutoMission, &armed);
        assert!(!mode.armed);
        assert!(mode.position_control);
    }

    #[test]
    fn termination_disables_everything_but_the_flag() {
        let armed = ActuatorArmed {
            armed: true,
            force_failsafe: true,
            ..Default::default()
        };
        let mode = control_mode_for(NavState::Termination, &armed);
        assert!(mode.termination);
        assert!(!mode.armed);
        assert!(!mode.position_control);
    }

    #[test]
    fn battery_critical_wins_over_armed_green() {
        let inputs = LedInputs {
            arming_state: ArmingState::Armed,
            failsafe: false,
            battery_warning: BatteryWarning::Critical,
            home_valid: true,
            cpu_load: 0.2,
        };
        let led = led_for(&inputs, Timestamp::ZERO);
        assert_eq!(led.color, LedColor::Red);
    }

    #[test]
    fn standby_colour_encodes_home_knowledge() {
        let mut inputs = LedInputs {
            arming_state: ArmingState::Standby,
            failsafe: false,
            battery_warning: BatteryWarning::None,
            home_valid: false,
            cpu_load: 0.2,
        };
        assert_eq!(led_for(&inputs, Timestamp::ZERO).color, LedColor::Blue);
        inputs.home_valid = true;
        assert_eq!(led_for(&inputs, Timestamp::ZERO).color, LedColor::Green);
    }
}
