//! Vehicle commands, acknowledgements, and operator action requests
//!
//! A [`VehicleCommand`] is a discriminated record with an integer-coded
//! command id, up to seven parameters (five floats plus two doubles for
//! latitude/longitude), source and target addressing, and an external
//! flag. Every handled command is acknowledged exactly once with a
//! [`CommandAck`]. An [`ActionRequest`] is the compact equivalent for
//! stick, switch, and button intents surfaced by the manual control link.

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;
use crate::types::MainState;

/// Arm/disarm force sentinel, MAV_CMD_COMPONENT_ARM_DISARM param2
/// (MAVLink common message set)
pub const ARM_DISARM_FORCE_MAGIC: f32 = 21196.0;

/// In-air-restore sentinel, MAV_CMD_COMPONENT_ARM_DISARM param3, only
/// honoured together with a same-system source (MAVLink common message set)
pub const IN_AIR_RESTORE_MAGIC: f32 = 1234.0;

/// Default target component for the parachute trigger command
pub const DEFAULT_PARACHUTE_COMPONENT: u8 = 161;

/// Broadcast address matching any system or component
pub const BROADCAST_ID: u8 = 0;

/// Commands understood by the supervisory core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandId {
    /// Select the main flight mode
    SetMode,
    /// Arm or disarm the vehicle
    ComponentArmDisarm,
    /// Fly to a position, optionally switching to loiter
    Reposition,
    /// Lockdown, terminate, or clear lockdown
    FlightTermination,
    /// Establish the home position
    SetHome,
    /// Return to launch
    ReturnToLaunch,
    /// Autonomous takeoff
    Takeoff,
    /// Autonomous VTOL takeoff
    VtolTakeoff,
    /// Autonomous landing
    Land,
    /// Autonomous precision landing
    PrecisionLand,
    /// Start the stored mission at an index
    MissionStart,
    /// Enable or disable the high-latency link
    ControlHighLatency,
    /// Orbit a point of interest
    Orbit,
    /// Drive a single actuator for bench testing
    ActuatorTest,
    /// Reboot or shut down the autopilot
    RebootShutdown,
    /// Run a sensor calibration
    Calibration,
    /// Magnetometer calibration with a fixed yaw reference
    FixedMagCalYaw,
    /// Load, save, or reset the parameter storage
    StorageAccess,
    /// Re-run the prearm checks now
    RunPrearmChecks,
    /// Put the receiver into bind mode
    StartRxPair,
    /// Set the origin of the local frame
    SetGpsGlobalOrigin,
    /// Trigger the parachute (re-emitted towards the parachute component)
    ParachuteRelease,
}

impl CommandId {
    /// Short stable identifier for logs and events
    pub const fn as_str(&self) -> &'static str {
        match self {
            CommandId::SetMode => "set_mode",
            CommandId::ComponentArmDisarm => "component_arm_disarm",
            CommandId::Reposition => "reposition",
            CommandId::FlightTermination => "flight_termination",
            CommandId::SetHome => "set_home",
            CommandId::ReturnToLaunch => "return_to_launch",
            CommandId::Takeoff => "takeoff",
            CommandId::VtolTakeoff => "vtol_takeoff",
            CommandId::Land => "land",
            CommandId::PrecisionLand => "precision_land",
            CommandId::MissionStart => "mission_start",
            CommandId::ControlHighLatency => "control_high_latency",
            CommandId::Orbit => "orbit",
            CommandId::ActuatorTest => "actuator_test",
            CommandId::RebootShutdown => "reboot_shutdown",
            CommandId::Calibration => "calibration",
            CommandId::FixedMagCalYaw => "fixed_mag_cal_yaw",
            CommandId::StorageAccess => "storage_access",
            CommandId::RunPrearmChecks => "run_prearm_checks",
            CommandId::StartRxPair => "start_rx_pair",
            CommandId::SetGpsGlobalOrigin => "set_gps_global_origin",
            CommandId::ParachuteRelease => "parachute_release",
        }
    }
}

/// A command sent to (or re-emitted by) the supervisory core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleCommand {
    /// Which operation is requested
    pub command: CommandId,
    /// First float parameter
    pub param1: f32,
    /// Second float parameter
    pub param2: f32,
    /// Third float parameter
    pub param3: f32,
    /// Fourth float parameter
    pub param4: f32,
    /// Fifth float parameter
    pub param5: f32,
    /// Latitude in degrees where applicable
    pub param6: f64,
    /// Longitude in degrees where applicable
    pub param7: f64,
    /// System id of the sender
    pub source_system: u8,
    /// Component id of the sender
    pub source_component: u8,
    /// System id this command addresses (0 broadcasts)
    pub target_system: u8,
    /// Component id this command addresses (0 broadcasts)
    pub target_component: u8,
    /// Whether the command arrived over an external link
    pub from_external: bool,
    /// When the command was received
    pub timestamp: Timestamp,
}

impl VehicleCommand {
    /// A zeroed command of the given id addressed to everyone
    pub fn new(command: CommandId) -> Self {
        Self {
            command,
            param1: 0.0,
            param2: 0.0,
            param3: 0.0,
            param4: 0.0,
            param5: 0.0,
            param6: 0.0,
            param7: 0.0,
            source_system: 0,
            source_component: 0,
            target_system: BROADCAST_ID,
            target_component: BROADCAST_ID,
            from_external: false,
            timestamp: Timestamp::ZERO,
        }
    }

    /// Arm (or disarm) the vehicle; `forced` skips the health gates
    pub fn arm_disarm(arm: bool, forced: bool) -> Self {
        let mut cmd = Self::new(CommandId::ComponentArmDisarm);
        cmd.param1 = if arm { 1.0 } else { 0.0 };
        cmd.param2 = if forced { ARM_DISARM_FORCE_MAGIC } else { 0.0 };
        cmd
    }

    /// Select a main flight mode
    pub fn set_mode(mode: MainState) -> Self {
        let (main, sub) = custom_mode_of(mode);
        let mut cmd = Self::new(CommandId::SetMode);
        cmd.param1 = 1.0; // custom mode enabled
        cmd.param2 = main as f32;
        cmd.param3 = sub as f32;
        cmd
    }

    /// Fly to `lat`/`lon`/`alt`; bit 0 of `flags` also switches to loiter
    pub fn reposition(lat: f64, lon: f64, alt: f32, flags: u32) -> Self {
        let mut cmd = Self::new(CommandId::Reposition);
        cmd.param2 = flags as f32;
        cmd.param3 = alt;
        cmd.param6 = lat;
        cmd.param7 = lon;
        cmd
    }

    /// Lockdown (`level` > 1.5), terminate (`level` > 0.5), or clear
    pub fn flight_termination(level: f32) -> Self {
        let mut cmd = Self::new(CommandId::FlightTermination);
        cmd.param1 = level;
        cmd
    }

    /// Set home from the current position
    pub fn set_home_here() -> Self {
        let mut cmd = Self::new(CommandId::SetHome);
        cmd.param1 = 1.0;
        cmd
    }

    /// Set home to an explicit position
    pub fn set_home(lat: f64, lon: f64, alt: f32, yaw: f32) -> Self {
        let mut cmd = Self::new(CommandId::SetHome);
        cmd.param3 = alt;
        cmd.param4 = yaw;
        cmd.param6 = lat;
        cmd.param7 = lon;
        cmd
    }

    /// Start the stored mission at `first_item`
    pub fn mission_start(first_item: u32) -> Self {
        let mut cmd = Self::new(CommandId::MissionStart);
        cmd.param1 = first_item as f32;
        cmd
    }

    /// Reboot (`1`), shut down (`2`), or reboot to the bootloader (`3`)
    pub fn reboot_shutdown(kind: u32) -> Self {
        let mut cmd = Self::new(CommandId::RebootShutdown);
        cmd.param1 = kind as f32;
        cmd
    }

    /// Trigger the parachute, addressed to the parachute component
    pub fn parachute_release(system: u8, parachute_component: u8) -> Self {
        let mut cmd = Self::new(CommandId::ParachuteRelease);
        cmd.param1 = 2.0; // release
        cmd.target_system = system;
        cmd.target_component = parachute_component;
        cmd
    }

    /// Whether the command addresses the given system and component
    pub fn targets(&self, system: u8, component: u8) -> bool {
        (self.target_system == BROADCAST_ID || self.target_system == system)
            && (self.target_component == BROADCAST_ID || self.target_component == component)
    }
}

/// Result of handling a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AckResult {
    /// The command was executed
    Accepted,
    /// The command may be retried later
    TemporarilyRejected,
    /// A precondition failed; the command will not be retried usefully
    Denied,
    /// The command was accepted but its operation could not complete
    Failed,
    /// The command is not handled in this configuration
    Unsupported,
}

impl AckResult {
    /// Whether the requester should hear the negative acoustic cue
    pub const fn is_negative(&self) -> bool {
        !matches!(self, AckResult::Accepted)
    }
}

/// Acknowledgement for a handled command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandAck {
    /// The command being acknowledged
    pub command: CommandId,
    /// How it was handled
    pub result: AckResult,
    /// System the ACK is addressed to (the command's source)
    pub target_system: u8,
    /// Component the ACK is addressed to (the command's source)
    pub target_component: u8,
    /// Whether the ACK must leave over the external link
    pub from_external: bool,
    /// When the ACK was produced
    pub timestamp: Timestamp,
}

/// Where an operator action request originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionSource {
    /// Stick gesture
    RcStick,
    /// Dedicated switch
    RcSwitch,
    /// Momentary button
    RcButton,
    /// Mode slot selector
    RcModeSlot,
}

/// What the operator asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestedAction {
    /// Arm the vehicle
    Arm,
    /// Disarm the vehicle
    Disarm,
    /// Toggle the arm state
    ToggleArm,
    /// Engage the kill switch (manual lockdown)
    Kill,
    /// Release the kill switch
    Unkill,
    /// Switch the main flight mode
    SwitchMode,
}

/// A compact user-intent event from the manual control link
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Input that produced the request
    pub source: ActionSource,
    /// Requested action
    pub action: RequestedAction,
    /// Target mode for [`RequestedAction::SwitchMode`]
    pub mode: Option<MainState>,
    /// When the request was produced
    pub timestamp: Timestamp,
}

impl ActionRequest {
    /// Build a mode-switch request
    pub fn switch_mode(source: ActionSource, mode: MainState, timestamp: Timestamp) -> Self {
        Self {
            source,
            action: RequestedAction::SwitchMode,
            mode: Some(mode),
            timestamp,
        }
    }
}

/// Encode a main state as the wire custom mode (main, sub) pair
pub const fn custom_mode_of(mode: MainState) -> (u32, u32) {
    match mode {
        MainState::Manual => (1, 0),
        MainState::Altctl => (2, 0),
        MainState::Posctl => (3, 0),
        MainState::AutoMission => (4, 4),
        MainState::AutoLoiter => (4, 3),
        MainState::AutoRtl => (4, 5),
        MainState::Acro => (5, 0),
        MainState::Offboard => (6, 0),
        MainState::Stab => (7, 0),
        MainState::AutoTakeoff => (4, 2),
        MainState::AutoLand => (4, 6),
        MainState::AutoFollowTarget => (4, 8),
        MainState::AutoPrecland => (4, 9),
        MainState::Orbit => (8, 0),
        MainState::AutoVtolTakeoff => (4, 10),
    }
}

/// Decode the wire custom mode (main, sub) pair back to a main state
pub const fn main_state_of(main: u32, sub: u32) -> Option<MainState> {
    match (main, sub) {
        (1, _) => Some(MainState::Manual),
        (2, _) => Some(MainState::Altctl),
        (3, _) => Some(MainState::Posctl),
        (4, 2) => Some(MainState::AutoTakeoff),
        (4, 3) => Some(MainState::AutoLoiter),
        (4, 4) => Some(MainState::AutoMission),
        (4, 5) => Some(MainState::AutoRtl),
        (4, 6) => Some(MainState::AutoLand),
        (4, 8) => Some(MainState::AutoFollowTarget),
        (4, 9) => Some(MainState::AutoPrecland),
        (4, 10) => Some(MainState::AutoVtolTakeoff),
        (5, _) => Some(MainState::Acro),
        (6, _) => Some(MainState::Offboard),
        (7, _) => Some(MainState::Stab),
        (8, _) => Some(MainState::Orbit),
        _ => None,
    }
}
