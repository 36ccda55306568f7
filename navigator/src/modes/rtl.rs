//! Return to launch
//!
//! Four flavours: fly home directly, fly to the closest safe
//! destination, join the mission landing sequence, or traverse the
//! visited mission in reverse. The direct flavour climbs to the return
//! altitude, flies home, descends, optionally holds, and lands.

use uas_core_shared::events::Severity;
use uas_core_shared::geo;
use uas_core_shared::mission::{MissionItem, MissionPlan};
use uas_core_shared::setpoint::{PositionSetpoint, SetpointType};
use uas_core_shared::time::{Duration, Timestamp};
use uas_core_shared::types::RtlType;

use super::NavContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RtlPhase {
    Climb,
    Return,
    Descend,
    Hold,
    Land,
    Done,
}

#[derive(Debug, Clone)]
enum RtlRoute {
    /// Climb, return to home, descend, hold, land
    Home,
    /// Follow a prepared item sequence, landing at its end
    Items { items: Vec<MissionItem>, index: usize },
}

/// The return mode object
#[derive(Debug, Clone)]
pub struct RtlMode {
    phase: RtlPhase,
    route: RtlRoute,
    hold_until: Option<Timestamp>,
    finished: bool,
}

impl Default for RtlMode {
    fn default() -> Self {
        Self {
            phase: RtlPhase::Done,
            route: RtlRoute::Home,
            hold_until: None,
            finished: false,
        }
    }
}

impl RtlMode {
    /// Whether the return completed with a landing
    pub const fn finished(&self) -> bool {
        self.finished
    }

    /// Select the route and start the return
    ///
    /// `plan` and `mission_index` describe the mission the vehicle was
    /// flying, used by the mission-landing and reverse flavours.
    pub fn on_activate(
        &mut self,
        ctx: &mut NavContext<'_>,
        plan: &MissionPlan,
        mission_index: usize,
    ) {
        self.finished = false;
        self.hold_until = None;
        ctx.result.finished = false;
        ctx.result.timestamp = ctx.now;
        self.route = select_route(ctx, ctx.params.rtl_type, plan, mission_index);
        self.phase = RtlPhase::Climb;

        if matches!(self.route, RtlRoute::Home) {
            ctx.emit("navigator_rtl", Severity::Info, "returning to launch");
            self.enter_climb(ctx);
        } else {
            ctx.emit(
                "navigator_rtl",
                Severity::Info,
                "returning via mission landing",
            );
            self.phase = RtlPhase::Return;
            self.build_item_triplet(ctx);
        }
    }

    /// Advance the return state machine
    pub fn on_active(&mut self, ctx: &mut NavContext<'_>) {
        match self.route.clone() {
            RtlRoute::Home => self.advance_home(ctx),
            RtlRoute::Items { items, index } => self.advance_items(ctx, items, index),
        }
    }

    fn enter_climb(&mut self, ctx: &mut NavContext<'_>) {
        let Some((lat, lon, alt)) = ctx.position() else {
            return;
        };
        let return_alt = (ctx.home.alt + ctx.params.rtl_return_altitude).max(alt);
        ctx.triplet.previous = PositionSetpoint::position(lat, lon, alt);
        ctx.triplet.current = PositionSetpoint::position(lat, lon, return_alt);
        ctx.triplet.next =
            PositionSetpoint::position(ctx.home.lat, ctx.home.lon, return_alt);
        ctx.touch_triplet();
    }

    fn advance_home(&mut self, ctx: &mut NavContext<'_>) {
        let home = ctx.home;
        let return_alt = home.alt + ctx.params.rtl_return_altitude;
        let descend_alt = home.alt + ctx.params.rtl_descend_altitude;

        match self.phase {
            RtlPhase::Climb => {
                let climbed = ctx
                    .global
                    .map(|g| g.alt >= return_alt - ctx.params.altitude_acceptance)
                    .unwrap_or(false);
                if climbed {
                    self.phase = RtlPhase::Return;
                    ctx.triplet.previous = ctx.triplet.current;
                    ctx.triplet.current =
                        PositionSetpoint::position(home.lat, home.lon, return_alt);
                    ctx.triplet.next =
                        PositionSetpoint::position(home.lat, home.lon, descend_alt);
                    ctx.touch_triplet();
                }
            }
            RtlPhase::Return => {
                if ctx.reached(home.lat, home.lon, return_alt, 0.0) {
                    self.phase = RtlPhase::Descend;
                    ctx.triplet.previous = ctx.triplet.current;
                    ctx.triplet.current = PositionSetpoint::loiter(
                        home.lat,
                        home.lon,
                        descend_alt,
                        ctx.params.loiter_radius,
                    );
                    ctx.triplet.next = PositionSetpoint::INVALID;
                    ctx.touch_triplet();
                }
            }
            RtlPhase::Descend => {
                let descended = ctx
                    .global
                    .map(|g| g.alt <= descend_alt + ctx.params.altitude_acceptance)
                    .unwrap_or(false);
                if descended {
                    if ctx.params.rtl_land_delay < 0.0 {
                        // configured to hold above home indefinitely
                        self.phase = RtlPhase::Hold;
                    } else if ctx.params.rtl_land_delay > 0.0 {
                        self.phase = RtlPhase::Hold;
                        self.hold_until = Some(
                            ctx.now + Duration::from_secs_f32(ctx.params.rtl_land_delay),
                        );
                    } else {
                        self.enter_land(ctx);
                    }
                }
            }
            RtlPhase::Hold => {
                if let Some(deadline) = self.hold_until {
                    if ctx.now >= deadline {
                        self.enter_land(ctx);
                    }
                }
            }
            RtlPhase::Land => {
                if ctx.land.landed {
                    self.phase = RtlPhase::Done;
                    self.finished = true;
                    ctx.result.finished = true;
                    ctx.result.timestamp = ctx.now;
                    ctx.emit("navigator_rtl_done", Severity::Info, "landed at home");
                }
            }
            RtlPhase::Done => {}
        }
    }

    fn enter_land(&mut self, ctx: &mut NavContext<'_>) {
        let home = ctx.home;
        self.phase = RtlPhase::Land;
        ctx.triplet.previous = ctx.triplet.current;
        ctx.triplet.current = PositionSetpoint {
            setpoint_type: SetpointType::Land,
            ..PositionSetpoint::position(home.lat, home.lon, home.alt)
        };
        ctx.triplet.next = PositionSetpoint::INVALID;
        ctx.touch_triplet();
    }

    fn build_item_triplet(&mut self, ctx: &mut NavContext<'_>) {
        let RtlRoute::Items { items, index } = &self.route else {
            return;
        };
        let Some(item) = items.get(*index) else {
            return;
        };
        ctx.triplet.previous = match ctx.position() {
            Some((lat, lon, alt)) => PositionSetpoint::position(lat, lon, alt),
            None => PositionSetpoint::INVALID,
        };
        let mut current = PositionSetpoint::position(item.lat, item.lon, item.altitude);
        if matches!(item.command, uas_core_shared::mission::MissionCommand::Land) {
            current.setpoint_type = SetpointType::Land;
        }
        ctx.triplet.current = current;
        ctx.triplet.next = items
            .get(index + 1)
            .map(|i| PositionSetpoint::position(i.lat, i.lon, i.altitude))
            .unwrap_or(PositionSetpoint::INVALID);
        ctx.touch_triplet();
    }

    fn advance_items(
        &mut self,
        ctx: &mut NavContext<'_>,
        items: Vec<MissionItem>,
        index: usize,
    ) {
        if self.finished {
            return;
        }
        let Some(item) = items.get(index) else {
            self.finished = true;
            return;
        };
        let is_last = index + 1 >= items.len();
        if is_last && matches!(item.command, uas_core_shared::mission::MissionCommand::Land) {
            if ctx.land.landed {
                self.finished = true;
                ctx.result.finished = true;
                ctx.result.timestamp = ctx.now;
                ctx.emit("navigator_rtl_done", Severity::Info, "landed via mission");
            }
            return;
        }
        if ctx.reached(item.lat, item.lon, item.altitude, item.acceptance_radius) {
            if is_last {
                self.finished = true;
                ctx.result.finished = true;
                ctx.result.timestamp = ctx.now;
            } else {
                self.route = RtlRoute::Items {
                    items,
                    index: index + 1,
                };
                self.build_item_triplet(ctx);
            }
        }
    }
}

/// Pick the route for the configured return flavour
fn select_route(
    ctx: &NavContext<'_>,
    rtl_type: RtlType,
    plan: &MissionPlan,
    mission_index: usize,
) -> RtlRoute {
    match rtl_type {
        RtlType::Direct => RtlRoute::Home,
        RtlType::MissionLanding => landing_route(plan).unwrap_or(RtlRoute::Home),
        RtlType::MissionLandingReversed => reversed_route(ctx, plan, mission_index),
        RtlType::Closest => closest_route(ctx, plan),
    }
}

/// The mission landing sequence as an item route, when the plan has one
fn landing_route(plan: &MissionPlan) -> Option<RtlRoute> {
    let start = plan.land_start_index()?;
    let items: Vec<MissionItem> = plan.items[start..].to_vec();
    if items.is_empty() {
        None
    } else {
        Some(RtlRoute::Items { items, index: 0 })
    }
}

/// Visited mission items in reverse, ending with a landing at home
fn reversed_route(ctx: &NavContext<'_>, plan: &MissionPlan, mission_index: usize) -> RtlRoute {
    if plan.land_start_index().is_none() || plan.is_empty() {
        return RtlRoute::Home;
    }
    let last = mission_index.min(plan.items.len().saturating_sub(1));
    let mut items: Vec<MissionItem> = plan.items[..=last].to_vec();
    items.reverse();
    let mut landing = MissionItem::waypoint(ctx.home.lat, ctx.home.lon, ctx.home.alt);
    landing.command = uas_core_shared::mission::MissionCommand::Land;
    items.push(landing);
    RtlRoute::Items { items, index: 0 }
}

/// Home or the mission landing start, whichever is nearer
fn closest_route(ctx: &NavContext<'_>, plan: &MissionPlan) -> RtlRoute {
    let Some((lat, lon, _)) = ctx.position() else {
        return RtlRoute::Home;
    };
    let home_distance = geo::distance_m(lat, lon, ctx.home.lat, ctx.home.lon);
    if let Some(start) = plan.land_start_index() {
        let item = plan.items[start];
        let landing_distance = geo::distance_m(lat, lon, item.lat, item.lon);
        if landing_distance < home_distance {
            if let Some(route) = landing_route(plan) {
                return route;
            }
        }
    }
    RtlRoute::Home
}
