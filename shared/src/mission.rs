//! Mission plan records and mission progress reporting

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// What a mission item asks the vehicle to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissionCommand {
    /// Fly through or to the item position
    Waypoint,
    /// Take off to the item altitude
    Takeoff,
    /// Land at the item position
    Land,
    /// Marker for the start of the landing sequence
    LandStart,
    /// Loiter at the item position until commanded onwards
    LoiterUnlimited,
}

/// A single mission item
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MissionItem {
    /// What to do
    pub command: MissionCommand,
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Altitude in metres above mean sea level
    pub altitude: f32,
    /// Yaw demand in radians, if any
    pub yaw: Option<f32>,
    /// Arrival acceptance radius in metres, zero for the default
    pub acceptance_radius: f32,
    /// Loiter radius in metres for loiter items
    pub loiter_radius: f32,
    /// Continue to the next item without operator input
    pub autocontinue: bool,
}

impl MissionItem {
    /// A plain waypoint at the given coordinates
    pub fn waypoint(lat: f64, lon: f64, altitude: f32) -> Self {
        Self {
            command: MissionCommand::Waypoint,
            lat,
            lon,
            altitude,
            yaw: None,
            acceptance_radius: 0.0,
            loiter_radius: 0.0,
            autocontinue: true,
        }
    }
}

/// An uploaded mission plan
///
/// Mission storage itself is external; the navigator only ever sees the
/// complete plan as a topic snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MissionPlan {
    /// Generation counter, bumped on every upload
    pub instance_count: u32,
    /// The ordered mission items
    pub items: Vec<MissionItem>,
}

impl MissionPlan {
    /// Index of the landing-sequence start marker, if the plan has one
    pub fn land_start_index(&self) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.command == MissionCommand::LandStart)
    }

    /// Whether the plan contains any items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Mission execution progress, published by the navigator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MissionResult {
    /// The plan passed validation
    pub valid: bool,
    /// The plan could not be executed
    pub failure: bool,
    /// The mission demanded flight termination
    pub flight_termination: bool,
    /// All items were completed
    pub finished: bool,
    /// A non-fatal issue was found
    pub warning: bool,
    /// Generation counter of the executed plan
    pub instance_count: u32,
    /// Item currently being pursued
    pub seq_current: u32,
    /// Total number of items in the plan
    pub seq_total: u32,
    /// The plan contains a landing sequence
    pub land_start_available: bool,
    /// Index of the landing-sequence start when available
    pub land_start_index: u32,
    /// When the record was produced
    pub timestamp: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn land_start_is_found() {
        let mut plan = MissionPlan::default();
        plan.items.push(MissionItem::waypoint(47.0, 8.0, 500.0));
        plan.items.push(MissionItem {
            command: MissionCommand::LandStart,
            ..MissionItem::waypoint(47.1, 8.1, 480.0)
        });
        plan.items.push(MissionItem {
            command: MissionCommand::Land,
            ..MissionItem::waypoint(47.2, 8.2, 460.0)
        });
        assert_eq!(plan.land_start_index(), Some(1));
    }

    #[test]
    fn plan_without_landing_reports_none() {
        let mut plan = MissionPlan::default();
        plan.items.push(MissionItem::waypoint(47.0, 8.0, 500.0));
        assert_eq!(plan.land_start_index(), None);
    }
}
