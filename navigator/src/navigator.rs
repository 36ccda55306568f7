//! The navigator dispatcher
//!
//! One active mode at a time, selected solely from the commander's
//! published navigation state. Mode changes reset the triplet except for
//! the two documented preservation cases, and a disarmed vehicle forces
//! the active mode to none with a single invalid triplet publication.

use uas_core_shared::bus::{CommandQueue, FlightBus, Subscription, Topic};
use uas_core_shared::command::{CommandId, VehicleCommand};
use uas_core_shared::events::Event;
use uas_core_shared::mission::{MissionPlan, MissionResult};
use uas_core_shared::params::Parameters;
use uas_core_shared::sensors::{GlobalPosition, LandDetected, LocalPosition};
use uas_core_shared::setpoint::{PositionSetpoint, PositionSetpointTriplet, SetpointType};
use uas_core_shared::status::{GeofenceResult, HomePosition, VehicleStatus};
use uas_core_shared::time::{Duration, Timestamp};
use uas_core_shared::types::GeofenceAction;

use crate::geofence_avoidance::corrective_loiter;
use crate::modes::{
    LandMode, LoiterMode, MissionMode, ModeKind, NavContext, PrecLandMode, RtlMode, TakeoffMode,
};

/// Navigator tick period
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// The navigator with its arena of mode objects
#[derive(Debug)]
pub struct Navigator {
    params: Parameters,

    // bus handles
    status_topic: Topic<VehicleStatus>,
    home_topic: Topic<HomePosition>,
    global_topic: Topic<GlobalPosition>,
    local_topic: Topic<LocalPosition>,
    land_topic: Topic<LandDetected>,
    geofence_topic: Topic<GeofenceResult>,
    plan_sub: Subscription<MissionPlan>,
    params_sub: Subscription<Parameters>,
    commands_in: CommandQueue<VehicleCommand>,
    events_out: CommandQueue<Event>,
    triplet_topic: Topic<PositionSetpointTriplet>,
    result_topic: Topic<MissionResult>,

    // mode arena
    mission: MissionMode,
    loiter: LoiterMode,
    rtl: RtlMode,
    takeoff: TakeoffMode,
    vtol_takeoff: TakeoffMode,
    land: LandMode,
    precland: PrecLandMode,

    // state
    active: ModeKind,
    triplet: PositionSetpointTriplet,
    result: MissionResult,
    published_triplet: Option<PositionSetpointTriplet>,
    published_result: Option<MissionResult>,
    invalid_published: bool,
    geofence_loiter_on: bool,
}

impl Navigator {
    /// Build a navigator wired to the given bus
    pub fn new(bus: &FlightBus, params: Parameters) -> Self {
        Self {
            params,
            status_topic: bus.vehicle_status.clone(),
            home_topic: bus.home_position.clone(),
            global_topic: bus.global_position.clone(),
            local_topic: bus.local_position.clone(),
            land_topic: bus.land_detected.clone(),
            geofence_topic: bus.geofence_result.clone(),
            plan_sub: bus.mission_plan.subscribe(),
            params_sub: bus.parameter_update.subscribe(),
            commands_in: bus.navigator_command.clone(),
            events_out: bus.events.clone(),
            triplet_topic: bus.position_setpoint_triplet.clone(),
            result_topic: bus.mission_result.clone(),
            mission: MissionMode::default(),
            loiter: LoiterMode::default(),
            rtl: RtlMode::default(),
            takeoff: TakeoffMode::default(),
            vtol_takeoff: TakeoffMode::default(),
            land: LandMode::default(),
            precland: PrecLandMode::default(),
            active: ModeKind::None,
            triplet: PositionSetpointTriplet::invalid(),
            result: MissionResult::default(),
            published_triplet: None,
            published_result: None,
            invalid_published: false,
            geofence_loiter_on: false,
        }
    }

    /// The active mode object
    pub const fn active(&self) -> ModeKind {
        self.active
    }

    /// Whether the geofence corrective loiter is engaged
    pub const fn geofence_loiter_on(&self) -> bool {
        self.geofence_loiter_on
    }

    /// Run one navigator tick
    pub fn tick(&mut self, now: Timestamp) {
        let Some(status) = self.status_topic.latest() else {
            return;
        };

        if !status.is_armed() {
            if let Some(params) = self.params_sub.updated() {
                self.params = params;
            }
        }

        self.adopt_plan(now);
        self.drain_commands();

        let armed = status.is_armed();
        let global = self.global_topic.latest();
        let local = self.local_topic.latest();
        let home = self.home_topic.latest().unwrap_or(HomePosition::INVALID);
        let land = self.land_topic.latest().unwrap_or_default();

        if !armed {
            if self.active != ModeKind::None {
                self.deactivate(self.active);
                self.active = ModeKind::None;
                self.geofence_loiter_on = false;
            }
            if !self.invalid_published {
                self.triplet.reset();
                self.triplet.timestamp = now;
                self.triplet_topic.publish(self.triplet);
                self.published_triplet = Some(self.triplet);
                self.invalid_published = true;
            }
            self.publish_result();
            return;
        }
        self.invalid_published = false;

        let desired = ModeKind::for_nav_state(status.nav_state);

        let mut ctx = NavContext {
            params: &self.params,
            global,
            local,
            home,
            land,
            triplet: &mut self.triplet,
            result: &mut self.result,
            events: &self.events_out,
            now,
        };

        if desired != self.active {
            // default on every change: all three setpoints reset; a
            // finished takeoff hands its altitude to the hold, and a
            // still-valid hold pattern survives re-entry
            let from_takeoff = matches!(self.active, ModeKind::Takeoff | ModeKind::VtolTakeoff);
            let preserve = desired == ModeKind::Loiter
                && (from_takeoff || ctx.triplet.holds_valid_loiter());

            if !preserve {
                ctx.triplet.reset();
                ctx.touch_triplet();
            }

            let previous = self.active;
            self.active = desired;
            self.geofence_loiter_on = false;

            match previous {
                ModeKind::Mission => self.mission.on_deactivate(),
                ModeKind::Takeoff => self.takeoff.on_deactivate(),
                ModeKind::VtolTakeoff => self.vtol_takeoff.on_deactivate(),
                _ => {}
            }

            match desired {
                ModeKind::None => {}
                ModeKind::Mission => self.mission.on_activate(&mut ctx),
                ModeKind::Loiter => {
                    if preserve {
                        // keep position and altitude, continue as a hold
                        ctx.triplet.current.setpoint_type = SetpointType::Loiter;
                        if ctx.triplet.current.loiter_radius <= 0.0 {
                            ctx.triplet.current.loiter_radius = ctx.params.loiter_radius;
                        }
                        ctx.touch_triplet();
                    } else {
                        self.loiter.on_activate(&mut ctx);
                    }
                }
                ModeKind::Rtl => {
                    self.rtl
                        .on_activate(&mut ctx, self.mission.plan(), self.mission.current_index())
                }
                ModeKind::Takeoff => self.takeoff.on_activate(&mut ctx),
                ModeKind::VtolTakeoff => self.vtol_takeoff.on_activate(&mut ctx),
                ModeKind::Land => self.land.on_activate(&mut ctx),
                ModeKind::Precland => self.precland.on_activate(&mut ctx),
            }
        } else {
            match self.active {
                ModeKind::None => {}
                ModeKind::Mission => self.mission.on_active(&mut ctx),
                ModeKind::Loiter => self.loiter.on_active(&mut ctx),
                ModeKind::Rtl => self.rtl.on_active(&mut ctx),
                ModeKind::Takeoff => self.takeoff.on_active(&mut ctx),
                ModeKind::VtolTakeoff => self.vtol_takeoff.on_active(&mut ctx),
                ModeKind::Land => self.land.on_active(&mut ctx),
                ModeKind::Precland => self.precland.on_active(&mut ctx),
            }
        }

        // a predicted breach with the hold action steers back inside
        if self.active == ModeKind::Loiter && !self.geofence_loiter_on {
            if let Some(fence) = self.geofence_topic.latest() {
                if fence.breached && fence.action == GeofenceAction::Hold {
                    if let Some(setpoint) =
                        corrective_loiter(&self.params, &home, global.as_ref(), local.as_ref())
                    {
                        self.loiter.set_reposition(setpoint);
                        self.loiter.on_active(&mut ctx);
                        self.geofence_loiter_on = true;
                    }
                }
            }
        }

        drop(ctx);

        if self.published_triplet.as_ref() != Some(&self.triplet) {
            self.triplet_topic.publish(self.triplet);
            self.published_triplet = Some(self.triplet);
        }
        self.publish_result();
    }

    fn deactivate(&mut self, kind: ModeKind) {
        match kind {
            ModeKind::Mission => self.mission.on_deactivate(),
            ModeKind::Takeoff => self.takeoff.on_deactivate(),
            ModeKind::VtolTakeoff => self.vtol_takeoff.on_deactivate(),
            _ => {}
        }
    }

    /// Validate and adopt a freshly uploaded plan
    fn adopt_plan(&mut self, now: Timestamp) {
        let Some(plan) = self.plan_sub.updated() else {
            return;
        };
        let valid = !plan.is_empty()
            && plan.items.iter().all(|item| {
                item.lat.is_finite() && item.lon.is_finite() && item.altitude.is_finite()
            });

        self.result.valid = valid;
        self.result.failure = false;
        self.result.warning = !valid && !plan.is_empty();
        self.result.finished = false;
        self.result.instance_count = plan.instance_count;
        self.result.seq_current = 0;
        self.result.seq_total = plan.items.len() as u32;
        self.result.land_start_available = plan.land_start_index().is_some();
        self.result.land_start_index = plan.land_start_index().unwrap_or(0) as u32;
        self.result.timestamp = now;

        if valid {
            self.mission.set_plan(plan);
        }
    }

    fn drain_commands(&mut self) {
        while let Some(cmd) = self.commands_in.pop() {
            match cmd.command {
                CommandId::Reposition => {
                    if cmd.param6.is_finite() && cmd.param7.is_finite() {
                        let alt = if cmd.param3.is_finite() && cmd.param3 != 0.0 {
                            cmd.param3
                        } else {
                            self.global_topic.latest().map(|g| g.alt).unwrap_or(0.0)
                        };
                        self.loiter.set_reposition(PositionSetpoint::loiter(
                            cmd.param6,
                            cmd.param7,
                            alt,
                            self.params.loiter_radius,
                        ));
                    }
                }
                CommandId::MissionStart => {
                    self.mission.set_start_index(cmd.param1.max(0.0) as usize);
                }
                CommandId::Takeoff => {
                    self.takeoff.set_commanded_altitude(cmd.param3);
                }
                CommandId::VtolTakeoff => {
                    self.vtol_takeoff.set_commanded_altitude(cmd.param3);
                }
                _ => {}
            }
        }
    }

    fn publish_result(&mut self) {
        if self.published_result != Some(self.result) {
            self.result_topic.publish(self.result);
            self.published_result = Some(self.result);
        }
    }
}

/// Drive a navigator at its fixed period until told to exit
pub async fn run(
    mut navigator: Navigator,
    clock: uas_core_shared::time::BootClock,
    mut should_exit: tokio::sync::watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(std::time::Duration::from_micros(
        TICK_INTERVAL.as_micros(),
    ));
    loop {
        interval.tick().await;
        navigator.tick(clock.now());
        if *should_exit.borrow_and_update() {
            break;
        }
    }
    tracing::info!("navigator loop exited");
}
