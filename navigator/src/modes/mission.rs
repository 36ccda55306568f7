//! Mission execution
//!
//! Steps through the uploaded plan item by item, keeping the triplet's
//! previous/current/next setpoints aligned with progress, and reports
//! progress through the mission-result record.

use uas_core_shared::events::Severity;
use uas_core_shared::mission::{MissionCommand, MissionItem, MissionPlan};
use uas_core_shared::setpoint::{PositionSetpoint, SetpointType};

use super::NavContext;

/// The mission mode object
#[derive(Debug, Clone, Default)]
pub struct MissionMode {
    plan: MissionPlan,
    current: usize,
    start_index: Option<usize>,
    finished: bool,
}

impl MissionMode {
    /// Adopt a freshly uploaded plan; restarts progress on a new upload
    pub fn set_plan(&mut self, plan: MissionPlan) {
        if plan.instance_count != self.plan.instance_count {
            self.current = 0;
            self.finished = false;
        }
        self.plan = plan;
    }

    /// The adopted plan
    pub const fn plan(&self) -> &MissionPlan {
        &self.plan
    }

    /// Index of the item currently pursued
    pub const fn current_index(&self) -> usize {
        self.current
    }

    /// Select the first item of the next activation
    pub fn set_start_index(&mut self, index: usize) {
        self.start_index = Some(index);
    }

    /// Begin or resume the mission
    pub fn on_activate(&mut self, ctx: &mut NavContext<'_>) {
        if let Some(start) = self.start_index.take() {
            self.current = start.min(self.plan.items.len().saturating_sub(1));
            self.finished = false;
        }
        if self.plan.is_empty() {
            self.finished = true;
            self.report(ctx);
            return;
        }
        self.build_triplet(ctx);
        self.report(ctx);
        ctx.emit(
            "navigator_mission",
            Severity::Info,
            format!("mission item {} of {}", self.current + 1, self.plan.items.len()),
        );
    }

    /// Advance through the plan as items are reached
    pub fn on_active(&mut self, ctx: &mut NavContext<'_>) {
        if self.finished || self.plan.is_empty() {
            return;
        }
        let item = self.plan.items[self.current];
        if !item.autocontinue && item.command == MissionCommand::LoiterUnlimited {
            return;
        }
        if ctx.reached(item.lat, item.lon, item.altitude, item.acceptance_radius) {
            if self.current + 1 < self.plan.items.len() {
                self.current += 1;
                self.build_triplet(ctx);
            } else {
                self.finished = true;
                ctx.emit("navigator_mission_done", Severity::Info, "mission finished");
            }
            self.report(ctx);
        }
    }

    /// Forget progress when the plan is abandoned
    pub fn on_deactivate(&mut self) {
        self.finished = false;
    }

    fn build_triplet(&self, ctx: &mut NavContext<'_>) {
        let items = &self.plan.items;
        let current = items[self.current];

        ctx.triplet.previous = if self.current > 0 {
            setpoint_for(&items[self.current - 1], ctx)
        } else {
            match ctx.position() {
                Some((lat, lon, alt)) => PositionSetpoint::position(lat, lon, alt),
                None => PositionSetpoint::INVALID,
            }
        };
        ctx.triplet.current = setpoint_for(&current, ctx);
        ctx.triplet.next = items
            .get(self.current + 1)
            .map(|item| setpoint_for(item, ctx))
            .unwrap_or(PositionSetpoint::INVALID);
        ctx.touch_triplet();
    }

    fn report(&self, ctx: &mut NavContext<'_>) {
        ctx.result.instance_count = self.plan.instance_count;
        ctx.result.seq_current = self.current as u32;
        ctx.result.seq_total = self.plan.items.len() as u32;
        ctx.result.finished = self.finished;
        ctx.result.timestamp = ctx.now;
    }
}

/// Translate a mission item into a position setpoint
fn setpoint_for(item: &MissionItem, ctx: &NavContext<'_>) -> PositionSetpoint {
    let setpoint_type = match item.command {
        MissionCommand::Takeoff => SetpointType::Takeoff,
        MissionCommand::Land => SetpointType::Land,
        MissionCommand::LoiterUnlimited => SetpointType::Loiter,
        MissionCommand::Waypoint | MissionCommand::LandStart => SetpointType::Position,
    };
    PositionSetpoint {
        valid: true,
        setpoint_type,
        lat: item.lat,
        lon: item.lon,
        alt: item.altitude,
        yaw: item.yaw.unwrap_or(0.0),
        yaw_valid: item.yaw.is_some(),
        loiter_radius: if item.loiter_radius > 0.0 {
            item.loiter_radius
        } else {
            ctx.params.loiter_radius
        },
        loiter_ccw: item.loiter_radius < 0.0,
        cruising_speed: -1.0,
        cruising_throttle: -1.0,
        acceptance_radius: if item.acceptance_radius > 0.0 {
            item.acceptance_radius
        } else {
            ctx.params.acceptance_radius
        },
    }
}
