//! Position setpoints consumed by the downstream position controller
//!
//! The navigator owns and mutates the triplet; the position controller
//! only ever reads published snapshots.

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Kind of a single position setpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetpointType {
    /// Motors idle, no position demand
    Idle,
    /// Hold a loiter pattern at the position
    Loiter,
    /// Climb to the position from the ground
    Takeoff,
    /// Descend onto the position
    Land,
    /// Fly through or to the position
    Position,
}

/// A single position demand
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSetpoint {
    /// Whether the setpoint may be used
    pub valid: bool,
    /// What to do at the position
    pub setpoint_type: SetpointType,
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Altitude in metres above mean sea level
    pub alt: f32,
    /// Commanded yaw in radians
    pub yaw: f32,
    /// Whether the yaw demand is meaningful
    pub yaw_valid: bool,
    /// Loiter radius in metres
    pub loiter_radius: f32,
    /// Loiter counter-clockwise when set
    pub loiter_ccw: bool,
    /// Cruise speed demand in m/s, negative for default
    pub cruising_speed: f32,
    /// Cruise throttle demand, negative for default
    pub cruising_throttle: f32,
    /// Arrival acceptance radius in metres
    pub acceptance_radius: f32,
}

impl PositionSetpoint {
    /// An invalid placeholder setpoint
    pub const INVALID: PositionSetpoint = PositionSetpoint {
        valid: false,
        setpoint_type: SetpointType::Idle,
        lat: 0.0,
        lon: 0.0,
        alt: 0.0,
        yaw: 0.0,
        yaw_valid: false,
        loiter_radius: 0.0,
        loiter_ccw: false,
        cruising_speed: -1.0,
        cruising_throttle: -1.0,
        acceptance_radius: 0.0,
    };

    /// A position setpoint at the given coordinates
    pub fn position(lat: f64, lon: f64, alt: f32) -> Self {
        Self {
            valid: true,
            setpoint_type: SetpointType::Position,
            lat,
            lon,
            alt,
            ..Self::INVALID
        }
    }

    /// A loiter setpoint at the given coordinates
    pub fn loiter(lat: f64, lon: f64, alt: f32, radius: f32) -> Self {
        Self {
            valid: true,
            setpoint_type: SetpointType::Loiter,
            lat,
            lon,
            alt,
            loiter_radius: radius,
            ..Self::INVALID
        }
    }
}

impl Default for PositionSetpoint {
    fn default() -> Self {
        Self::INVALID
    }
}

/// The ordered trio of setpoints driving the position controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSetpointTriplet {
    /// The setpoint just passed
    pub previous: PositionSetpoint,
    /// The setpoint currently pursued
    pub current: PositionSetpoint,
    /// The setpoint after the current one
    pub next: PositionSetpoint,
    /// When the triplet was last updated
    pub timestamp: Timestamp,
}

impl PositionSetpointTriplet {
    /// A triplet with all three setpoints invalid
    pub const fn invalid() -> Self {
        Self {
            previous: PositionSetpoint::INVALID,
            current: PositionSetpoint::INVALID,
            next: PositionSetpoint::INVALID,
            timestamp: Timestamp::ZERO,
        }
    }

    /// Invalidate all three setpoints
    pub fn reset(&mut self) {
        self.previous = PositionSetpoint::INVALID;
        self.current = PositionSetpoint::INVALID;
        self.next = PositionSetpoint::INVALID;
    }

    /// Whether the current setpoint is a usable loiter demand
    pub fn holds_valid_loiter(&self) -> bool {
        self.current.valid && self.current.setpoint_type == SetpointType::Loiter
    }
}

impl Default for PositionSetpointTriplet {
    fn default() -> Self {
        Self::invalid()
    }
}

/// Region-of-interest pointing target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleRoi {
    /// Whether a target is set
    pub valid: bool,
    /// Latitude of the target in degrees
    pub lat: f64,
    /// Longitude of the target in degrees
    pub lon: f64,
    /// Altitude of the target in metres above mean sea level
    pub alt: f32,
    /// When the target was set
    pub timestamp: Timestamp,
}

impl Default for VehicleRoi {
    fn default() -> Self {
        Self {
            valid: false,
            lat: 0.0,
            lon: 0.0,
            alt: 0.0,
            timestamp: Timestamp::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_invalidates_all_three() {
        let mut triplet = PositionSetpointTriplet::invalid();
        triplet.current = PositionSetpoint::position(47.0, 8.0, 500.0);
        triplet.next = PositionSetpoint::position(47.1, 8.1, 510.0);
        triplet.reset();
        assert!(!triplet.previous.valid);
        assert!(!triplet.current.valid);
        assert!(!triplet.next.valid);
    }

    #[test]
    fn loiter_detection_requires_validity() {
        let mut triplet = PositionSetpointTriplet::invalid();
        triplet.current = PositionSetpoint::loiter(47.0, 8.0, 500.0, 80.0);
        assert!(triplet.holds_valid_loiter());
        triplet.current.valid = false;
        assert!(!triplet.holds_valid_loiter());
    }
}
