//! Published supervisory status records
//!
//! These are the records the commander publishes whenever a field changes
//! or the periodic republish interval elapses. Downstream consumers treat
//! each record as a complete snapshot; nothing is shared by reference.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time::{Duration, Timestamp};
use crate::types::{ArmingState, BatteryWarning, GeofenceAction, MainState, NavState, VehicleType};

/// Supervisory vehicle status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleStatus {
    /// System id of this vehicle
    pub system_id: u8,
    /// Component id of the supervisory core
    pub component_id: u8,
    /// Random id of this boot session
    pub session: Uuid,
    /// Airframe class
    pub vehicle_type: VehicleType,
    /// Motor-enablement lifecycle state
    pub arming_state: ArmingState,
    /// Effective navigation state after failsafe resolution
    pub nav_state: NavState,
    /// Whether any failsafe currently overrides the operator's mode
    pub failsafe: bool,
    /// Cause of the active failsafe, if any
    pub failsafe_cause: Option<FailsafeCause>,
    /// Manual control link lost (debounced)
    pub rc_signal_lost: bool,
    /// Ground station link lost (debounced)
    pub data_link_lost: bool,
    /// High-latency backup link lost
    pub high_latency_data_link_lost: bool,
    /// A USB host is attached (sticky within the session)
    pub usb_connected: bool,
    /// VTOL transition in progress
    pub in_transition_mode: bool,
    /// VTOL transition towards fixed-wing in progress
    pub in_transition_to_fw: bool,
    /// When the core booted
    pub boot_at: Timestamp,
    /// When the vehicle last armed
    pub armed_at: Option<Timestamp>,
    /// When the vehicle last took off
    pub takeoff_at: Option<Timestamp>,
    /// When the navigation state last changed
    pub nav_state_changed_at: Timestamp,
}

impl VehicleStatus {
    /// Fresh boot-time status for the given addressing and airframe
    pub fn at_boot(system_id: u8, component_id: u8, vehicle_type: VehicleType) -> Self {
        Self {
            system_id,
            component_id,
            session: Uuid::new_v4(),
            vehicle_type,
            arming_state: ArmingState::Init,
            nav_state: NavState::Manual,
            failsafe: false,
            failsafe_cause: None,
            rc_signal_lost: true,
            data_link_lost: true,
            high_latency_data_link_lost: false,
            usb_connected: false,
            in_transition_mode: false,
            in_transition_to_fw: false,
            boot_at: Timestamp::ZERO,
            armed_at: None,
            takeoff_at: None,
            nav_state_changed_at: Timestamp::ZERO,
        }
    }

    /// Whether the motors are enabled
    pub const fn is_armed(&self) -> bool {
        matches!(self.arming_state, ArmingState::Armed)
    }
}

/// Motor-enablement output record
///
/// Equality is structural so the commander can publish only on change.
/// `force_failsafe` is monotone once set within a flight and causes an
/// unconditional motor-off; `lockdown` may be cleared by command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorArmed {
    /// Motors enabled
    pub armed: bool,
    /// Actuators may move while disarmed (servo pre-positioning)
    pub prearmed: bool,
    /// All checks pass for an immediate arm
    pub ready_to_arm: bool,
    /// Motors forced off, recoverable by command
    pub lockdown: bool,
    /// Kill switch engaged
    pub manual_lockdown: bool,
    /// Non-recoverable termination output
    pub force_failsafe: bool,
    /// ESC calibration pass-through active
    pub in_esc_calibration_mode: bool,
}

/// Pre-flight and runtime pass/fail flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusFlags {
    /// GNSS fix acceptable
    pub gps_valid: bool,
    /// Global position estimate acceptable
    pub global_position_valid: bool,
    /// Local position estimate acceptable
    pub local_position_valid: bool,
    /// Local velocity estimate acceptable
    pub local_velocity_valid: bool,
    /// Home position established and finite
    pub home_position_valid: bool,
    /// Battery depletion warning level
    pub battery_warning: BatteryWarning,
    /// Estimated remaining flight time at the current draw
    pub battery_low_remaining_time: Option<Duration>,
    /// All preflight checks pass
    pub pre_flight_checks_pass: bool,
    /// A calibration routine is running
    pub calibration_enabled: bool,
    /// RC calibration in progress (suppresses the negative cue)
    pub rc_calibration_in_progress: bool,
    /// Offboard setpoint stream stale
    pub offboard_control_signal_lost: bool,
    /// A VTOL transition failed
    pub vtol_transition_failure: bool,
}

/// Operator mode-selection state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommanderState {
    /// Currently selected main flight mode
    pub main_state: MainState,
    /// Monotonic count of accepted mode changes
    pub main_state_changes: u64,
}

impl Default for CommanderState {
    fn default() -> Self {
        Self {
            main_state: MainState::Manual,
            main_state_changes: 0,
        }
    }
}

/// Control loops enabled for the active navigation state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleControlMode {
    /// Motors enabled
    pub armed: bool,
    /// Operator sticks drive the vehicle
    pub manual_control: bool,
    /// Body-rate control loop active
    pub rates_control: bool,
    /// Attitude control loop active
    pub attitude_control: bool,
    /// Altitude control loop active
    pub altitude_control: bool,
    /// Position control loop active
    pub position_control: bool,
    /// Velocity control loop active
    pub velocity_control: bool,
    /// Setpoints come from the offboard stream
    pub offboard_control: bool,
    /// Failure outputs engaged, controllers ignored
    pub termination: bool,
}

/// Debounced failure-detector output flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureFlags {
    /// Roll angle beyond the configured limit
    pub roll: bool,
    /// Pitch angle beyond the configured limit
    pub pitch: bool,
    /// Altitude loss beyond the configured limit
    pub alt: bool,
    /// External failure input asserted
    pub ext: bool,
    /// An ESC failed to answer arming within the spool-up window
    pub arm_esc: bool,
    /// Bitmask of motors reported failed
    pub motor_mask: u16,
    /// Propeller imbalance metric beyond the configured limit
    pub imbalanced_prop: bool,
}

impl FailureFlags {
    /// Attitude or altitude has departed the safe envelope
    pub const fn attitude_failure(&self) -> bool {
        self.roll || self.pitch || self.alt || self.ext
    }

    /// Any motor reported failed
    pub const fn motor_failure(&self) -> bool {
        self.motor_mask != 0
    }
}

/// Why a failsafe decision fired
///
/// Each cause carries a stable id used by downstream UI localisation and
/// a human-readable reason for the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailsafeCause {
    /// Non-recoverable termination output was set
    FlightTermination,
    /// The mission requested termination
    MissionTermination,
    /// Geofence breach with terminate action
    GeofenceTermination,
    /// Critical attitude failure right after takeoff
    EarlyTakeoffFailure,
    /// Battery at emergency level
    BatteryEmergency,
    /// Battery warning level worsened
    BatteryLevel,
    /// Ground station link lost beyond the threshold
    DataLinkLoss,
    /// Manual control link lost while armed
    RcLoss,
    /// Offboard stream lost while in offboard mode
    OffboardLoss,
    /// Geofence breach with a recoverable action
    GeofenceViolation,
    /// Maximum flight time reached
    MaxFlightTime,
    /// Predicted remaining battery flight time too low
    LowRemainingFlightTime,
    /// Wind above the hard limit
    HighWind,
    /// VTOL transition failure forced a quadchute
    Quadchute,
    /// A motor failure was detected
    MotorFailure,
    /// Propeller imbalance above the configured limit
    ImbalancedPropeller,
}

impl FailsafeCause {
    /// Stable event id for downstream localisation
    pub const fn event_id(&self) -> &'static str {
        match self {
            FailsafeCause::FlightTermination => "failsafe_flight_termination",
            FailsafeCause::MissionTermination => "failsafe_mission_termination",
            FailsafeCause::GeofenceTermination => "failsafe_geofence_termination",
            FailsafeCause::EarlyTakeoffFailure => "failsafe_early_takeoff_failure",
            FailsafeCause::BatteryEmergency => "failsafe_battery_emergency",
            FailsafeCause::BatteryLevel => "failsafe_battery_level",
            FailsafeCause::DataLinkLoss => "commander_gcs_lost",
            FailsafeCause::RcLoss => "commander_rc_lost",
            FailsafeCause::OffboardLoss => "commander_offboard_lost",
            FailsafeCause::GeofenceViolation => "failsafe_geofence_violation",
            FailsafeCause::MaxFlightTime => "failsafe_max_flight_time",
            FailsafeCause::LowRemainingFlightTime => "failsafe_low_remaining_time",
            FailsafeCause::HighWind => "failsafe_high_wind",
            FailsafeCause::Quadchute => "failsafe_quadchute",
            FailsafeCause::MotorFailure => "failsafe_motor_failure",
            FailsafeCause::ImbalancedPropeller => "failsafe_imbalanced_prop",
        }
    }

    /// Human-readable reason for operator-facing messages
    pub const fn describe(&self) -> &'static str {
        match self {
            FailsafeCause::FlightTermination => "flight termination engaged",
            FailsafeCause::MissionTermination => "mission requested termination",
            FailsafeCause::GeofenceTermination => "geofence breach, terminating",
            FailsafeCause::EarlyTakeoffFailure => "critical failure during takeoff",
            FailsafeCause::BatteryEmergency => "battery level emergency",
            FailsafeCause::BatteryLevel => "battery level dropped",
            FailsafeCause::DataLinkLoss => "ground station link lost",
            FailsafeCause::RcLoss => "manual control link lost",
            FailsafeCause::OffboardLoss => "offboard stream lost",
            FailsafeCause::GeofenceViolation => "geofence violated",
            FailsafeCause::MaxFlightTime => "maximum flight time reached",
            FailsafeCause::LowRemainingFlightTime => "remaining flight time low",
            FailsafeCause::HighWind => "wind speed above limit",
            FailsafeCause::Quadchute => "transition failure, quadchute",
            FailsafeCause::MotorFailure => "motor failure",
            FailsafeCause::ImbalancedPropeller => "imbalanced propeller",
        }
    }
}

/// Home reference position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomePosition {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Altitude in metres above mean sea level
    pub alt: f32,
    /// Yaw at the home point in radians
    pub yaw: f32,
    /// When home was (re)established
    pub timestamp: Timestamp,
    /// Whether the position may be used
    pub valid: bool,
}

impl HomePosition {
    /// An unset home position
    pub const INVALID: HomePosition = HomePosition {
        lat: 0.0,
        lon: 0.0,
        alt: 0.0,
        yaw: 0.0,
        timestamp: Timestamp::ZERO,
        valid: false,
    };

    /// Validity requires the flag plus finite coordinates
    pub fn usable(&self) -> bool {
        self.valid && self.lat.is_finite() && self.lon.is_finite() && self.alt.is_finite()
    }
}

impl Default for HomePosition {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Geofence monitor verdict
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeofenceResult {
    /// The vehicle is outside the fence now
    pub breached: bool,
    /// The braking-distance test point leaves the fence
    pub predicted: bool,
    /// Distance-to-home limit exceeded
    pub max_distance_exceeded: bool,
    /// Altitude limit exceeded
    pub max_altitude_exceeded: bool,
    /// Configured reaction to a breach
    pub action: GeofenceAction,
    /// When the verdict was produced
    pub timestamp: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actuator_armed_equality_is_structural() {
        let a = ActuatorArmed {
            armed: true,
            ..Default::default()
        };
        let b = ActuatorArmed {
            armed: true,
            ..Default::default()
        };
        assert_eq!(a, b);
        let c = ActuatorArmed {
            armed: true,
            lockdown: true,
            ..Default::default()
        };
        assert_ne!(a, c);
    }

    #[test]
    fn home_with_nan_is_unusable() {
        let mut home = HomePosition {
            lat: 47.3977,
            lon: 8.5456,
            alt: 488.0,
            yaw: 0.0,
            timestamp: Timestamp::ZERO,
            valid: true,
        };
        assert!(home.usable());
        home.lat = f64::NAN;
        assert!(!home.usable());
    }

    #[test]
    fn every_cause_has_an_event_id() {
        let causes = [
            FailsafeCause::FlightTermination,
            FailsafeCause::DataLinkLoss,
            FailsafeCause::RcLoss,
            FailsafeCause::GeofenceViolation,
            FailsafeCause::HighWind,
        ];
        for cause in causes {
            assert!(!cause.event_id().is_empty());
            assert!(!cause.describe().is_empty());
        }
    }
}
