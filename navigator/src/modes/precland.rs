//! Precision landing
//!
//! Descends onto the landing-target position when the triplet already
//! carries one; otherwise onto the current position. The beacon tracker
//! supplying the target is an external collaborator.

use uas_core_shared::events::Severity;
use uas_core_shared::setpoint::{PositionSetpoint, SetpointType};

use super::NavContext;

/// The precision-landing mode object
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecLandMode {
    finished: bool,
}

impl PrecLandMode {
    /// Whether touchdown was detected
    pub const fn finished(&self) -> bool {
        self.finished
    }

    /// Build the descent setpoint
    pub fn on_activate(&mut self, ctx: &mut NavContext<'_>) {
        self.finished = false;
        ctx.result.finished = false;
        ctx.result.timestamp = ctx.now;
        let target = if ctx.triplet.current.valid {
            (ctx.triplet.current.lat, ctx.triplet.current.lon)
        } else if let Some((lat, lon, _)) = ctx.position() {
            (lat, lon)
        } else {
            ctx.triplet.reset();
            ctx.touch_triplet();
            return;
        };
        let (lat, lon) = target;
        ctx.triplet.previous = match ctx.position() {
            Some((lat, lon, alt)) => PositionSetpoint::position(lat, lon, alt),
            None => PositionSetpoint::INVALID,
        };
        ctx.triplet.current = PositionSetpoint {
            setpoint_type: SetpointType::Land,
            ..PositionSetpoint::position(lat, lon, ctx.home.alt)
        };
        ctx.triplet.next = PositionSetpoint::INVALID;
        ctx.touch_triplet();
        ctx.emit("navigator_precland", Severity::Info, "precision landing");
    }

    /// Report touchdown once
    pub fn on_active(&mut self, ctx: &mut NavContext<'_>) {
        if !self.finished && ctx.land.landed {
            self.finished = true;
            ctx.result.finished = true;
            ctx.result.timestamp = ctx.now;
            ctx.emit("navigator_precland_done", Severity::Info, "landed on target");
        }
    }
}
