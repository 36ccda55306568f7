//! Input topic records from estimators, links, and detectors
//!
//! The estimators, radios, and drivers behind these records are external
//! collaborators; the core only consumes their published snapshots.

use serde::{Deserialize, Serialize};

use crate::time::{Duration, Timestamp};
use crate::types::BatteryWarning;

/// Attitude estimate reduced to the angles the failure detector needs
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AttitudeSample {
    /// Roll angle in radians
    pub roll: f32,
    /// Pitch angle in radians
    pub pitch: f32,
    /// When the estimate was produced
    pub timestamp: Timestamp,
}

/// ESC driver status summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscStatus {
    /// Number of ESCs expected online
    pub esc_count: u8,
    /// Bitmask of ESCs that acknowledged arming
    pub armed_mask: u16,
    /// Bitmask of ESCs reporting failure
    pub failure_mask: u16,
    /// When the record was produced
    pub timestamp: Timestamp,
}

/// Airframe vibration summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VibrationMetrics {
    /// Propeller imbalance metric, dimensionless
    pub imbalance: f32,
    /// When the metric was produced
    pub timestamp: Timestamp,
}

/// Land detector output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandDetected {
    /// The vehicle is on the ground
    pub landed: bool,
    /// The vehicle is probably on the ground
    pub maybe_landed: bool,
    /// The gear touches the ground but the vehicle may still be flying
    pub ground_contact: bool,
    /// When the record was produced
    pub timestamp: Timestamp,
}

/// Local-frame position and velocity estimate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalPosition {
    /// Horizontal position estimate usable
    pub xy_valid: bool,
    /// Vertical position estimate usable
    pub z_valid: bool,
    /// Horizontal velocity estimate usable
    pub v_xy_valid: bool,
    /// Vertical velocity estimate usable
    pub v_z_valid: bool,
    /// North position in metres
    pub x: f32,
    /// East position in metres
    pub y: f32,
    /// Down position in metres
    pub z: f32,
    /// North velocity in m/s
    pub vx: f32,
    /// East velocity in m/s
    pub vy: f32,
    /// Down velocity in m/s
    pub vz: f32,
    /// Heading in radians
    pub heading: f32,
    /// When the estimate was produced
    pub timestamp: Timestamp,
}

impl LocalPosition {
    /// Horizontal ground speed in m/s
    pub fn ground_speed(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

/// Global position estimate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalPosition {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Altitude in metres above mean sea level
    pub alt: f32,
    /// When the estimate was produced
    pub timestamp: Timestamp,
}

/// Raw GNSS receiver output
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsPosition {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Altitude in metres above mean sea level
    pub alt: f32,
    /// GNSS fix type, 3 or above is a 3D fix
    pub fix_type: u8,
    /// Satellites used in the solution
    pub satellites_used: u8,
    /// When the fix was produced
    pub timestamp: Timestamp,
}

/// Operator stick positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualControl {
    /// Pitch stick, -1 to 1
    pub x: f32,
    /// Roll stick, -1 to 1
    pub y: f32,
    /// Yaw stick, -1 to 1
    pub r: f32,
    /// Throttle stick, 0 to 1
    pub throttle: f32,
    /// When the sample was received
    pub timestamp: Timestamp,
}

/// Throttle stick position treated as centred for climb-rate modes
pub const THROTTLE_CENTRE: f32 = 0.5;
/// Band around centre still treated as centred
pub const THROTTLE_CENTRE_BAND: f32 = 0.1;
/// Throttle stick position treated as idle
pub const THROTTLE_IDLE: f32 = 0.05;

impl ManualControl {
    /// Throttle above the centre band (would command a climb)
    pub fn throttle_above_centre(&self) -> bool {
        self.throttle > THROTTLE_CENTRE + THROTTLE_CENTRE_BAND
    }

    /// Throttle at the idle floor
    pub fn throttle_idle(&self) -> bool {
        self.throttle <= THROTTLE_IDLE
    }
}

/// Role of a telemetry link endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkRole {
    /// Ground control station
    Gcs,
    /// Onboard companion controller
    OnboardController,
    /// Parachute subsystem
    Parachute,
    /// Remote identification beacon
    OpenDroneId,
    /// Obstacle avoidance subsystem
    Avoidance,
    /// High-latency backup link
    HighLatency,
}

/// Heartbeat from one telemetry link endpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryHeartbeat {
    /// Who sent the heartbeat
    pub role: LinkRole,
    /// When it was received
    pub timestamp: Timestamp,
}

/// Offboard setpoint stream descriptor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffboardControlMode {
    /// Stream carries position setpoints
    pub position: bool,
    /// Stream carries velocity setpoints
    pub velocity: bool,
    /// Stream carries acceleration setpoints
    pub acceleration: bool,
    /// Stream carries attitude setpoints
    pub attitude: bool,
    /// Stream carries body-rate setpoints
    pub body_rate: bool,
    /// When the descriptor was last received
    pub timestamp: Timestamp,
}

/// VTOL transition status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VtolStatus {
    /// A transition is in progress
    pub in_transition: bool,
    /// The transition is towards fixed-wing flight
    pub in_transition_to_fw: bool,
    /// The transition failed and a quadchute is requested
    pub quadchute_request: bool,
    /// When the record was produced
    pub timestamp: Timestamp,
}

/// Wind estimate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindSample {
    /// North wind component in m/s
    pub north: f32,
    /// East wind component in m/s
    pub east: f32,
    /// When the estimate was produced
    pub timestamp: Timestamp,
}

impl WindSample {
    /// Wind speed magnitude in m/s
    pub fn speed(&self) -> f32 {
        (self.north * self.north + self.east * self.east).sqrt()
    }
}

/// Battery state summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatteryStatus {
    /// Depletion warning level
    pub warning: BatteryWarning,
    /// Remaining charge fraction, 0 to 1
    pub remaining: f32,
    /// Predicted remaining flight time at the current draw
    pub remaining_time: Option<Duration>,
    /// When the record was produced
    pub timestamp: Timestamp,
}

/// Processor load summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuLoad {
    /// CPU load fraction, 0 to 1
    pub load: f32,
    /// RAM usage fraction, 0 to 1
    pub ram_usage: f32,
    /// When the record was produced
    pub timestamp: Timestamp,
}

/// Board power status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemPower {
    /// A USB host is attached
    pub usb_connected: bool,
    /// The main power brick is valid
    pub brick_valid: bool,
    /// When the record was produced
    pub timestamp: Timestamp,
}

/// Safety switch state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySwitch {
    /// A safety switch is present
    pub available: bool,
    /// The switch is in the off (motors allowed) position
    pub off: bool,
    /// When the record was produced
    pub timestamp: Timestamp,
}

/// Minimal event record enqueued from the power-button interrupt context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerButtonEvent {
    /// The operator asked for a shutdown
    ShutdownRequest,
}

/// Nearby traffic report from a transponder receiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransponderReport {
    /// ICAO address of the traffic
    pub icao_address: u32,
    /// Reported callsign
    pub callsign: String,
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Altitude in metres above mean sea level
    pub alt: f32,
    /// Course over ground in radians
    pub heading: f32,
    /// Horizontal speed in m/s
    pub hor_velocity: f32,
    /// When the report was received
    pub timestamp: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_bands() {
        let mut stick = ManualControl::default();
        stick.throttle = 0.7;
        assert!(stick.throttle_above_centre());
        stick.throttle = 0.5;
        assert!(!stick.throttle_above_centre());
        stick.throttle = 0.02;
        assert!(stick.throttle_idle());
    }

    #[test]
    fn wind_speed_is_a_magnitude() {
        let wind = WindSample {
            north: 3.0,
            east: 4.0,
            timestamp: Timestamp::ZERO,
        };
        assert!((wind.speed() - 5.0).abs() < 1e-6);
    }
}
