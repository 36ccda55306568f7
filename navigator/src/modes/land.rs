//! Autonomous landing at the current position

use uas_core_shared::events::Severity;
use uas_core_shared::setpoint::{PositionSetpoint, SetpointType};

use super::NavContext;

/// The land mode object
#[derive(Debug, Clone, Copy, Default)]
pub struct LandMode {
    finished: bool,
}

impl LandMode {
    /// Whether touchdown was detected
    pub const fn finished(&self) -> bool {
        self.finished
    }

    /// Build the descent setpoint at the current position
    pub fn on_activate(&mut self, ctx: &mut NavContext<'_>) {
        self.finished = false;
        ctx.result.finished = false;
        ctx.result.timestamp = ctx.now;
        let Some((lat, lon, alt)) = ctx.position() else {
            ctx.triplet.reset();
            ctx.touch_triplet();
            return;
        };
        ctx.triplet.previous = PositionSetpoint::position(lat, lon, alt);
        ctx.triplet.current = PositionSetpoint {
            setpoint_type: SetpointType::Land,
            ..PositionSetpoint::position(lat, lon, ctx.home.alt)
        };
        ctx.triplet.next = PositionSetpoint::INVALID;
        ctx.touch_triplet();
        ctx.emit("navigator_land", Severity::Info, "landing");
    }

    /// Report touchdown once
    pub fn on_active(&mut self, ctx: &mut NavContext<'_>) {
        if !self.finished && ctx.land.landed {
            self.finished = true;
            ctx.result.finished = true;
            ctx.result.timestamp = ctx.now;
            ctx.emit("navigator_land_done", Severity::Info, "landed");
        }
    }
}
