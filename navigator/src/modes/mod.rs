//! Navigation mode objects
//!
//! Each mode is a plain struct owned by the navigator; dispatch is a
//! tagged match on [`ModeKind`], and every mode sees only the borrowed
//! [`NavContext`] with the operations it needs.

mod land;
mod loiter;
mod mission;
mod precland;
mod rtl;
mod takeoff;

pub use land::LandMode;
pub use loiter::LoiterMode;
pub use mission::MissionMode;
pub use precland::PrecLandMode;
pub use rtl::RtlMode;
pub use takeoff::TakeoffMode;

use uas_core_shared::bus::CommandQueue;
use uas_core_shared::events::{Event, Severity};
use uas_core_shared::geo;
use uas_core_shared::mission::MissionResult;
use uas_core_shared::params::Parameters;
use uas_core_shared::sensors::{GlobalPosition, LandDetected, LocalPosition};
use uas_core_shared::setpoint::PositionSetpointTriplet;
use uas_core_shared::status::HomePosition;
use uas_core_shared::time::Timestamp;
use uas_core_shared::types::NavState;

/// Which mode object is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeKind {
    /// No active mode; the triplet is not being driven
    #[default]
    None,
    /// Mission execution
    Mission,
    /// Position hold
    Loiter,
    /// Return to launch
    Rtl,
    /// Autonomous takeoff
    Takeoff,
    /// Autonomous VTOL takeoff
    VtolTakeoff,
    /// Autonomous landing
    Land,
    /// Precision landing
    Precland,
}

impl ModeKind {
    /// The mode object responsible for a navigation state
    pub const fn for_nav_state(nav_state: NavState) -> ModeKind {
        match nav_state {
            NavState::AutoMission => ModeKind::Mission,
            NavState::AutoLoiter => ModeKind::Loiter,
            NavState::AutoRtl => ModeKind::Rtl,
            NavState::AutoTakeoff => ModeKind::Takeoff,
            NavState::AutoVtolTakeoff => ModeKind::VtolTakeoff,
            NavState::AutoLand => ModeKind::Land,
            NavState::AutoPrecland => ModeKind::Precland,
            // manual, offboard, orbit, follow, descend, and termination
            // states are flown without the navigator
            _ => ModeKind::None,
        }
    }
}

/// Borrowed context a mode works against for one tick
pub struct NavContext<'a> {
    /// Parameter snapshot
    pub params: &'a Parameters,
    /// Latest global position estimate
    pub global: Option<GlobalPosition>,
    /// Latest local position estimate
    pub local: Option<LocalPosition>,
    /// Home reference position
    pub home: HomePosition,
    /// Land detector output
    pub land: LandDetected,
    /// The triplet the mode drives
    pub triplet: &'a mut PositionSetpointTriplet,
    /// Mission progress record the mode reports into
    pub result: &'a mut MissionResult,
    /// Operator event stream
    pub events: &'a CommandQueue<Event>,
    /// Current tick time
    pub now: Timestamp,
}

impl NavContext<'_> {
    /// Current position, when a global estimate exists
    pub fn position(&self) -> Option<(f64, f64, f32)> {
        self.global.map(|g| (g.lat, g.lon, g.alt))
    }

    /// Horizontal distance from the vehicle to a coordinate
    pub fn distance_to(&self, lat: f64, lon: f64) -> Option<f64> {
        self.global.map(|g| geo::distance_m(g.lat, g.lon, lat, lon))
    }

    /// Whether the vehicle is within acceptance of a setpoint
    pub fn reached(&self, lat: f64, lon: f64, alt: f32, acceptance_radius: f32) -> bool {
        let radius = if acceptance_radius > 0.0 {
            acceptance_radius
        } else {
            self.params.acceptance_radius
        };
        let Some(distance) = self.distance_to(lat, lon) else {
            return false;
        };
        let alt_ok = self
            .global
            .map(|g| (g.alt - alt).abs() <= self.params.altitude_acceptance)
            .unwrap_or(false);
        distance <= f64::from(radius) && alt_ok
    }

    /// Emit an operator event
    pub fn emit(&self, id: &'static str, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(id, "{message}");
        self.events.push(Event::new(id, severity, message, self.now));
    }

    /// Stamp the triplet as updated this tick
    pub fn touch_triplet(&mut self) {
        self.triplet.timestamp = self.now;
    }
}
