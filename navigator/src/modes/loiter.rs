//! Position hold
//!
//! Holds a loiter pattern at the current position, a commanded
//! reposition target, or a geofence-corrective point. When the triplet
//! already carries a valid loiter setpoint the dispatcher preserves it
//! and this mode leaves it untouched.

use uas_core_shared::setpoint::{PositionSetpoint, SetpointType};

use super::NavContext;

/// The loiter mode object
#[derive(Debug, Clone, Copy, Default)]
pub struct LoiterMode {
    reposition: Option<PositionSetpoint>,
}

impl LoiterMode {
    /// Install a reposition target for the next activation
    pub fn set_reposition(&mut self, setpoint: PositionSetpoint) {
        self.reposition = Some(setpoint);
    }

    /// Build the hold setpoint unless a valid one is being preserved
    pub fn on_activate(&mut self, ctx: &mut NavContext<'_>) {
        if let Some(target) = self.reposition.take() {
            self.install(ctx, target);
            return;
        }
        if ctx.triplet.holds_valid_loiter() {
            // preserved by the dispatcher, e.g. the takeoff altitude
            return;
        }
        let Some((lat, lon, alt)) = ctx.position() else {
            ctx.triplet.reset();
            ctx.touch_triplet();
            return;
        };
        let setpoint = PositionSetpoint::loiter(lat, lon, alt, ctx.params.loiter_radius);
        self.install(ctx, setpoint);
    }

    /// Apply a new reposition target while already holding
    pub fn on_active(&mut self, ctx: &mut NavContext<'_>) {
        if let Some(target) = self.reposition.take() {
            self.install(ctx, target);
        }
    }

    fn install(&mut self, ctx: &mut NavContext<'_>, mut setpoint: PositionSetpoint) {
        setpoint.valid = true;
        if setpoint.setpoint_type != SetpointType::Loiter {
            setpoint.setpoint_type = SetpointType::Loiter;
        }
        if setpoint.loiter_radius <= 0.0 {
            setpoint.loiter_radius = ctx.params.loiter_radius;
        }
        ctx.triplet.previous = PositionSetpoint::INVALID;
        ctx.triplet.current = setpoint;
        ctx.triplet.next = PositionSetpoint::INVALID;
        ctx.touch_triplet();
    }
}
