//! Autonomous takeoff
//!
//! Climbs straight up from the arming position to the takeoff altitude.
//! Completion is reported through the mission-progress record so the
//! supervisor can hand the vehicle over to a hold.

use uas_core_shared::events::Severity;
use uas_core_shared::setpoint::{PositionSetpoint, SetpointType};

use super::NavContext;

/// The takeoff mode object
#[derive(Debug, Clone, Copy, Default)]
pub struct TakeoffMode {
    target_alt: Option<f32>,
    commanded_relative_alt: Option<f32>,
    finished: bool,
}

impl TakeoffMode {
    /// Override the climb height for the next takeoff, metres above the
    /// current position
    pub fn set_commanded_altitude(&mut self, relative_alt: f32) {
        if relative_alt.is_finite() && relative_alt > 0.0 {
            self.commanded_relative_alt = Some(relative_alt);
        }
    }

    /// Whether the climb completed
    pub const fn finished(&self) -> bool {
        self.finished
    }

    /// Build the climb setpoint from the current position
    pub fn on_activate(&mut self, ctx: &mut NavContext<'_>) {
        self.finished = false;
        ctx.result.finished = false;
        ctx.result.timestamp = ctx.now;
        let Some((lat, lon, alt)) = ctx.position() else {
            self.target_alt = None;
            return;
        };
        let climb = self
            .commanded_relative_alt
            .take()
            .unwrap_or(ctx.params.takeoff_altitude);
        let target = alt + climb;
        self.target_alt = Some(target);

        ctx.triplet.previous = PositionSetpoint::position(lat, lon, alt);
        ctx.triplet.current = PositionSetpoint {
            setpoint_type: SetpointType::Takeoff,
            acceptance_radius: ctx.params.acceptance_radius,
            ..PositionSetpoint::position(lat, lon, target)
        };
        ctx.triplet.next = PositionSetpoint::INVALID;
        ctx.touch_triplet();
        ctx.emit(
            "navigator_takeoff",
            Severity::Info,
            format!("taking off to {target:.1} m"),
        );
    }

    /// Watch the climb and report completion once
    pub fn on_active(&mut self, ctx: &mut NavContext<'_>) {
        if self.finished {
            return;
        }
        let Some(target) = self.target_alt else {
            // no estimate at activation; try again now
            self.on_activate(ctx);
            return;
        };
        let reached = ctx
            .global
            .map(|g| g.alt >= target - ctx.params.altitude_acceptance)
            .unwrap_or(false);
        if reached && !ctx.land.landed {
            self.finished = true;
            ctx.result.finished = true;
            ctx.result.timestamp = ctx.now;
            ctx.emit("navigator_takeoff_done", Severity::Info, "takeoff altitude reached");
        }
    }

    /// Drop per-flight state when the mode deactivates
    pub fn on_deactivate(&mut self) {
        self.target_alt = None;
        self.finished = false;
    }
}
