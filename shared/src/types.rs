//! Core enumerations shared by the commander and navigator
//!
//! These types appear inside most topic records. They are plain data:
//! the transition rules that govern them live with the state machines in
//! the commander crate.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Airframe class of the vehicle
///
/// Several transition rules and failsafe reactions are gated on the
/// airframe: a fixed-wing cannot hover, a rover cannot descend, and a
/// hybrid VTOL switches behaviour mid-flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleType {
    /// Airframe not yet identified
    Unknown,
    /// Multirotor or helicopter
    RotaryWing,
    /// Fixed-wing aircraft
    FixedWing,
    /// Ground rover
    Rover,
    /// Hybrid vertical take-off and landing airframe
    Vtol,
}

impl VehicleType {
    /// Whether the vehicle can hold position by hovering
    pub const fn can_hover(&self) -> bool {
        matches!(self, VehicleType::RotaryWing | VehicleType::Vtol)
    }

    /// Whether the vehicle operates on the ground only
    pub const fn is_ground_vehicle(&self) -> bool {
        matches!(self, VehicleType::Rover)
    }
}

impl Default for VehicleType {
    fn default() -> Self {
        VehicleType::Unknown
    }
}

/// Lifecycle stage of motor enablement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArmingState {
    /// Boot or calibration, motors disabled
    Init,
    /// Disarmed and passing required checks
    Standby,
    /// Motors enabled
    Armed,
    /// Disarmed with a fatal problem blocking arming
    StandbyError,
    /// Terminal power-down state
    Shutdown,
    /// Transient state for an onboard restart while airborne
    InAirRestore,
}

impl Default for ArmingState {
    fn default() -> Self {
        ArmingState::Init
    }
}

/// Operator or automation requested flight mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MainState {
    /// Direct stick-to-actuator flight
    Manual,
    /// Manual flight with altitude stabilisation
    Altctl,
    /// Manual flight with position stabilisation
    Posctl,
    /// Autonomous mission execution
    AutoMission,
    /// Autonomous position hold
    AutoLoiter,
    /// Autonomous return to launch
    AutoRtl,
    /// Rate-only manual flight
    Acro,
    /// External computer supplies setpoints
    Offboard,
    /// Attitude-stabilised manual flight
    Stab,
    /// Autonomous takeoff
    AutoTakeoff,
    /// Autonomous landing
    AutoLand,
    /// Autonomous target following
    AutoFollowTarget,
    /// Autonomous precision landing
    AutoPrecland,
    /// Orbit around a point of interest
    Orbit,
    /// Autonomous VTOL takeoff
    AutoVtolTakeoff,
}

impl MainState {
    /// Whether the mode is flown by the operator's sticks
    pub const fn is_manual(&self) -> bool {
        matches!(
            self,
            MainState::Manual
                | MainState::Altctl
                | MainState::Posctl
                | MainState::Acro
                | MainState::Stab
        )
    }

    /// Whether the mode commands a climb rate from the throttle stick
    ///
    /// In these modes a centred throttle means "hold altitude", so arming
    /// with the stick above centre would command an immediate climb.
    pub const fn is_climb_rate_mode(&self) -> bool {
        matches!(self, MainState::Altctl | MainState::Posctl)
    }

    /// Whether the mode is autonomous
    pub const fn is_auto(&self) -> bool {
        matches!(
            self,
            MainState::AutoMission
                | MainState::AutoLoiter
                | MainState::AutoRtl
                | MainState::AutoTakeoff
                | MainState::AutoLand
                | MainState::AutoFollowTarget
                | MainState::AutoPrecland
                | MainState::AutoVtolTakeoff
        )
    }

    /// The navigation state this mode maps to when no failsafe is active
    pub const fn default_nav_state(&self) -> NavState {
        match self {
            MainState::Manual => NavState::Manual,
            MainState::Altctl => NavState::Altctl,
            MainState::Posctl => NavState::Posctl,
            MainState::AutoMission => NavState::AutoMission,
            MainState::AutoLoiter => NavState::AutoLoiter,
            MainState::AutoRtl => NavState::AutoRtl,
            MainState::Acro => NavState::Acro,
            MainState::Offboard => NavState::Offboard,
            MainState::Stab => NavState::Stab,
            MainState::AutoTakeoff => NavState::AutoTakeoff,
            MainState::AutoLand => NavState::AutoLand,
            MainState::AutoFollowTarget => NavState::AutoFollowTarget,
            MainState::AutoPrecland => NavState::AutoPrecland,
            MainState::Orbit => NavState::Orbit,
            MainState::AutoVtolTakeoff => NavState::AutoVtolTakeoff,
        }
    }

    /// Parse a mode name as used on the command line
    pub fn from_name(name: &str) -> Option<MainState> {
        match name {
            "manual" => Some(MainState::Manual),
            "altctl" => Some(MainState::Altctl),
            "posctl" => Some(MainState::Posctl),
            "mission" => Some(MainState::AutoMission),
            "loiter" | "hold" => Some(MainState::AutoLoiter),
            "rtl" => Some(MainState::AutoRtl),
            "acro" => Some(MainState::Acro),
            "offboard" => Some(MainState::Offboard),
            "stabilized" | "stab" => Some(MainState::Stab),
            "takeoff" => Some(MainState::AutoTakeoff),
            "land" => Some(MainState::AutoLand),
            "follow" => Some(MainState::AutoFollowTarget),
            "precland" => Some(MainState::AutoPrecland),
            "orbit" => Some(MainState::Orbit),
            "vtol_takeoff" => Some(MainState::AutoVtolTakeoff),
            _ => None,
        }
    }
}

impl fmt::Display for MainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MainState::Manual => "manual",
            MainState::Altctl => "altctl",
            MainState::Posctl => "posctl",
            MainState::AutoMission => "mission",
            MainState::AutoLoiter => "loiter",
            MainState::AutoRtl => "rtl",
            MainState::Acro => "acro",
            MainState::Offboard => "offboard",
            MainState::Stab => "stabilized",
            MainState::AutoTakeoff => "takeoff",
            MainState::AutoLand => "land",
            MainState::AutoFollowTarget => "follow",
            MainState::AutoPrecland => "precland",
            MainState::Orbit => "orbit",
            MainState::AutoVtolTakeoff => "vtol_takeoff",
        };
        f.write_str(name)
    }
}

/// Effective mode after failsafe resolution
///
/// This is what the downstream controllers obey. It extends the set of
/// main states with failsafe-only states that no operator can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavState {
    /// Direct stick-to-actuator flight
    Manual,
    /// Altitude-stabilised manual flight
    Altctl,
    /// Position-stabilised manual flight
    Posctl,
    /// Attitude-stabilised manual flight
    Stab,
    /// Rate-only manual flight
    Acro,
    /// External setpoint source
    Offboard,
    /// Orbit around a point of interest
    Orbit,
    /// Autonomous takeoff
    AutoTakeoff,
    /// Autonomous VTOL takeoff
    AutoVtolTakeoff,
    /// Autonomous position hold
    AutoLoiter,
    /// Autonomous mission execution
    AutoMission,
    /// Autonomous return to launch
    AutoRtl,
    /// Autonomous landing at the current position
    AutoLand,
    /// Autonomous precision landing
    AutoPrecland,
    /// Autonomous target following
    AutoFollowTarget,
    /// Failsafe descent without position control
    Descend,
    /// Irreversible flight termination
    Termination,
}

impl NavState {
    /// All navigation states, in a stable order usable as a mask index
    pub const ALL: [NavState; 17] = [
        NavState::Manual,
        NavState::Altctl,
        NavState::Posctl,
        NavState::Stab,
        NavState::Acro,
        NavState::Offboard,
        NavState::Orbit,
        NavState::AutoTakeoff,
        NavState::AutoVtolTakeoff,
        NavState::AutoLoiter,
        NavState::AutoMission,
        NavState::AutoRtl,
        NavState::AutoLand,
        NavState::AutoPrecland,
        NavState::AutoFollowTarget,
        NavState::Descend,
        NavState::Termination,
    ];

    /// Stable index into per-state masks
    pub const fn index(&self) -> usize {
        match self {
            NavState::Manual => 0,
            NavState::Altctl => 1,
            NavState::Posctl => 2,
            NavState::Stab => 3,
            NavState::Acro => 4,
            NavState::Offboard => 5,
            NavState::Orbit => 6,
            NavState::AutoTakeoff => 7,
            NavState::AutoVtolTakeoff => 8,
            NavState::AutoLoiter => 9,
            NavState::AutoMission => 10,
            NavState::AutoRtl => 11,
            NavState::AutoLand => 12,
            NavState::AutoPrecland => 13,
            NavState::AutoFollowTarget => 14,
            NavState::Descend => 15,
            NavState::Termination => 16,
        }
    }

    /// Whether the state is autonomous (navigator-driven)
    pub const fn is_auto(&self) -> bool {
        matches!(
            self,
            NavState::AutoTakeoff
                | NavState::AutoVtolTakeoff
                | NavState::AutoLoiter
                | NavState::AutoMission
                | NavState::AutoRtl
                | NavState::AutoLand
                | NavState::AutoPrecland
                | NavState::AutoFollowTarget
        )
    }

    /// Whether the state is a terminal failsafe state
    pub const fn is_termination(&self) -> bool {
        matches!(self, NavState::Termination)
    }
}

impl Default for NavState {
    fn default() -> Self {
        NavState::Manual
    }
}

/// Outcome of a state machine transition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionResult {
    /// The machine moved to the requested state
    Changed,
    /// The machine was already in the requested state
    NotChanged,
    /// The transition was refused
    Denied(DenialReason),
}

impl TransitionResult {
    /// Whether the machine is in the requested state after the attempt
    pub const fn accepted(&self) -> bool {
        matches!(self, TransitionResult::Changed | TransitionResult::NotChanged)
    }
}

/// Why a transition attempt was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenialReason {
    /// Preflight or in-flight health checks fail for the target state
    HealthChecksFailed,
    /// Throttle stick above centre in a climb-rate mode
    ThrottleAboveCentre,
    /// Throttle stick not at idle
    ThrottleNotIdle,
    /// Request from an RC source outside a manual mode
    NotInManualMode,
    /// Geofence return action configured but no valid home position
    HomeRequired,
    /// The vehicle is not landed
    NotLanded,
    /// The requested transition is not in the allowed set
    TransitionForbidden,
    /// Position or velocity estimate missing for the target mode
    EstimateMissing,
    /// No recent offboard setpoint stream
    OffboardSignalMissing,
    /// A calibration is in progress
    CalibrationActive,
    /// Flight termination latched, arming refused
    TerminationLatched,
}

impl DenialReason {
    /// Short stable identifier for events and logs
    pub const fn as_str(&self) -> &'static str {
        match self {
            DenialReason::HealthChecksFailed => "health_checks_failed",
            DenialReason::ThrottleAboveCentre => "throttle_above_centre",
            DenialReason::ThrottleNotIdle => "throttle_not_idle",
            DenialReason::NotInManualMode => "not_in_manual_mode",
            DenialReason::HomeRequired => "home_required",
            DenialReason::NotLanded => "not_landed",
            DenialReason::TransitionForbidden => "transition_forbidden",
            DenialReason::EstimateMissing => "estimate_missing",
            DenialReason::OffboardSignalMissing => "offboard_signal_missing",
            DenialReason::CalibrationActive => "calibration_active",
            DenialReason::TerminationLatched => "termination_latched",
        }
    }
}

/// Battery depletion warning level, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BatteryWarning {
    /// Charge level nominal
    None,
    /// Low charge, return soon
    Low,
    /// Critical charge, land or return now
    Critical,
    /// Emergency charge, land immediately
    Emergency,
}

impl Default for BatteryWarning {
    fn default() -> Self {
        BatteryWarning::None
    }
}

/// Configured reaction to a failsafe trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailsafeAction {
    /// Ignore the trigger
    None,
    /// Announce only
    Warn,
    /// Hold position
    Hold,
    /// Return to launch
    ReturnToLaunch,
    /// Land at the current position
    Land,
    /// Descend without position control
    Descend,
    /// Terminate the flight
    Terminate,
    /// Motors off, recoverable by command
    Lockdown,
}

/// Configured reaction to a geofence breach
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeofenceAction {
    /// Report only
    #[default]
    None,
    /// Announce the breach
    Warn,
    /// Hold position inside the fence
    Hold,
    /// Return to launch
    ReturnToLaunch,
    /// Land at the current position
    Land,
    /// Terminate the flight
    Terminate,
}

/// Reaction to offboard link loss while a manual link is still up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OffboardRcAction {
    /// Fall back to position-stabilised manual flight
    Position,
    /// Fall back to altitude-stabilised manual flight
    Altitude,
    /// Fall back to fully manual flight
    Manual,
    /// Return to launch
    ReturnToLaunch,
    /// Land at the current position
    Land,
    /// Hold position
    Hold,
}

/// Return-to-launch flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RtlType {
    /// Fly to home at the return altitude
    Direct,
    /// Fly to the nearest safe destination
    Closest,
    /// Join the mission landing sequence when one exists
    MissionLanding,
    /// Traverse the mission in reverse to reach its landing
    MissionLandingReversed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nav_state_indices_are_unique() {
        let mut seen = [false; NavState::ALL.len()];
        for state in NavState::ALL {
            let idx = state.index();
            assert!(!seen[idx], "duplicate index {idx}");
            seen[idx] = true;
        }
    }

    #[test]
    fn main_state_nav_mapping_is_identity_like() {
        assert_eq!(MainState::AutoRtl.default_nav_state(), NavState::AutoRtl);
        assert_eq!(MainState::Manual.default_nav_state(), NavState::Manual);
        assert_eq!(MainState::Orbit.default_nav_state(), NavState::Orbit);
    }

    #[test]
    fn mode_names_round_trip() {
        for state in [
            MainState::Manual,
            MainState::Posctl,
            MainState::AutoMission,
            MainState::AutoVtolTakeoff,
        ] {
            assert_eq!(MainState::from_name(&state.to_string()), Some(state));
        }
        assert_eq!(MainState::from_name("warp_drive"), None);
    }

    #[test]
    fn battery_warning_orders_by_severity() {
        assert!(BatteryWarning::Emergency > BatteryWarning::Critical);
        assert!(BatteryWarning::Critical > BatteryWarning::Low);
        assert!(BatteryWarning::Low > BatteryWarning::None);
    }
}
