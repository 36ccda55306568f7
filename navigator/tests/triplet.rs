//! Triplet handling and mode dispatch of the navigator
//!
//! The navigator is driven by hand-published status records here; the
//! full commander loop is exercised in the end-to-end scenarios.

use uas_core_shared::bus::FlightBus;
use uas_core_shared::geo;
use uas_core_shared::mission::{MissionCommand, MissionItem, MissionPlan};
use uas_core_shared::params::Parameters;
use uas_core_shared::sensors::{GlobalPosition, LandDetected, LocalPosition};
use uas_core_shared::setpoint::SetpointType;
use uas_core_shared::status::{GeofenceResult, HomePosition, VehicleStatus};
use uas_core_shared::time::{Duration, Timestamp};
use uas_core_shared::types::{ArmingState, GeofenceAction, NavState, RtlType, VehicleType};
use uas_navigator::modes::ModeKind;
use uas_navigator::Navigator;

const STEP: Duration = Duration::from_millis(50);

struct Fixture {
    bus: FlightBus,
    navigator: Navigator,
    now: Timestamp,
    status: VehicleStatus,
}

impl Fixture {
    fn new(params: Parameters) -> Self {
        let bus = FlightBus::new();
        let navigator = Navigator::new(&bus, params);
        let mut status = VehicleStatus::at_boot(1, 1, VehicleType::RotaryWing);
        status.arming_state = ArmingState::Armed;
        Self {
            bus,
            navigator,
            now: Timestamp::from_millis(600),
            status,
        }
    }

    fn set_nav_state(&mut self, nav_state: NavState) {
        self.status.nav_state = nav_state;
        self.status.nav_state_changed_at = self.now;
    }

    fn publish_position(&self, lat: f64, lon: f64, alt: f32) {
        self.bus.global_position.publish(GlobalPosition {
            lat,
            lon,
            alt,
            timestamp: self.now,
        });
    }

    fn publish_home(&self, lat: f64, lon: f64, alt: f32) {
        self.bus.home_position.publish(HomePosition {
            lat,
            lon,
            alt,
            yaw: 0.0,
            timestamp: self.now,
            valid: true,
        });
    }

    fn step(&mut self) {
        self.now = self.now + STEP;
        self.bus.vehicle_status.publish(self.status.clone());
        self.navigator.tick(self.now);
    }
}

#[test]
fn takeoff_to_loiter_preserves_the_takeoff_altitude() {
    let mut fixture = Fixture::new(Parameters::default());
    fixture.publish_home(47.0, 8.0, 488.0);
    fixture.publish_position(47.0, 8.0, 488.0);
    fixture.set_nav_state(NavState::AutoTakeoff);
    fixture.step();

    let triplet = fixture
        .bus
        .position_setpoint_triplet
        .latest()
        .expect("takeoff triplet");
    assert_eq!(triplet.current.setpoint_type, SetpointType::Takeoff);
    let takeoff_alt = triplet.current.alt;
    assert!((takeoff_alt - (488.0 + 2.5)).abs() < 0.01);

    // climb completes
    fixture.publish_position(47.0, 8.0, takeoff_alt);
    fixture.bus.land_detected.publish(LandDetected {
        landed: false,
        timestamp: fixture.now,
        ..Default::default()
    });
    fixture.step();
    assert!(fixture
        .bus
        .mission_result
        .latest()
        .map(|r| r.finished)
        .unwrap_or(false));

    // the hold keeps the takeoff altitude
    fixture.set_nav_state(NavState::AutoLoiter);
    fixture.step();
    let triplet = fixture
        .bus
        .position_setpoint_triplet
        .latest()
        .expect("loiter triplet");
    assert_eq!(triplet.current.setpoint_type, SetpointType::Loiter);
    assert_eq!(triplet.current.alt, takeoff_alt);
}

#[test]
fn mode_change_resets_the_triplet_by_default() {
    let mut fixture = Fixture::new(Parameters::default());
    fixture.publish_home(47.0, 8.0, 488.0);
    fixture.publish_position(47.0, 8.0, 500.0);
    fixture.set_nav_state(NavState::AutoLoiter);
    fixture.step();
    assert!(fixture
        .bus
        .position_setpoint_triplet
        .latest()
        .expect("loiter triplet")
        .current
        .valid);

    // manual flight: the navigator goes idle and the triplet resets
    fixture.set_nav_state(NavState::Posctl);
    fixture.step();
    assert_eq!(fixture.navigator.active(), ModeKind::None);
    let triplet = fixture
        .bus
        .position_setpoint_triplet
        .latest()
        .expect("reset triplet");
    assert!(!triplet.current.valid);
}

#[test]
fn valid_loiter_survives_reentry_from_rtl_descend() {
    let mut params = Parameters::default();
    params.rtl_land_delay = -1.0; // hold above home instead of landing
    let mut fixture = Fixture::new(params);
    fixture.publish_home(47.0, 8.0, 400.0);
    // already at the return altitude over home
    fixture.publish_position(47.0, 8.0, 460.0);
    fixture.set_nav_state(NavState::AutoRtl);
    fixture.step(); // activate: climb triplet
    fixture.step(); // climbed, return leg
    fixture.step(); // home reached, descend loiter installed

    let triplet = fixture
        .bus
        .position_setpoint_triplet
        .latest()
        .expect("descend triplet");
    assert_eq!(triplet.current.setpoint_type, SetpointType::Loiter);
    let descend_alt = triplet.current.alt;
    assert!((descend_alt - 430.0).abs() < 0.01);

    fixture.set_nav_state(NavState::AutoLoiter);
    fixture.step();
    let preserved = fixture
        .bus
        .position_setpoint_triplet
        .latest()
        .expect("preserved triplet");
    assert_eq!(preserved.current.setpoint_type, SetpointType::Loiter);
    assert_eq!(preserved.current.alt, descend_alt);
    assert_eq!(preserved.current.lat, 47.0);
}

#[test]
fn disarmed_vehicle_publishes_one_invalid_triplet() {
    let mut fixture = Fixture::new(Parameters::default());
    fixture.status.arming_state = ArmingState::Standby;
    fixture.publish_position(47.0, 8.0, 488.0);
    fixture.step();

    let mut sub = fixture.bus.position_setpoint_triplet.subscribe();
    let triplet = sub.latest().expect("invalid triplet published");
    assert!(!triplet.current.valid);
    let _ = sub.updated();

    for _ in 0..20 {
        fixture.step();
    }
    assert!(sub.updated().is_none(), "no republish while disarmed");
}

#[test]
fn mission_advances_and_reports_progress() {
    let mut fixture = Fixture::new(Parameters::default());
    fixture.publish_home(47.0, 8.0, 488.0);
    fixture.publish_position(47.0, 8.0, 500.0);

    let (wp1_lat, wp1_lon) = geo::project(47.0, 8.0, 0.0, 200.0);
    let (wp2_lat, wp2_lon) = geo::project(47.0, 8.0, 0.0, 400.0);
    let plan = MissionPlan {
        instance_count: 1,
        items: vec![
            MissionItem::waypoint(wp1_lat, wp1_lon, 500.0),
            MissionItem::waypoint(wp2_lat, wp2_lon, 500.0),
        ],
    };
    fixture.bus.mission_plan.publish(plan);
    fixture.step();
    let result = fixture.bus.mission_result.latest().expect("validated");
    assert!(result.valid);
    assert_eq!(result.seq_total, 2);

    fixture.set_nav_state(NavState::AutoMission);
    fixture.step();
    let triplet = fixture
        .bus
        .position_setpoint_triplet
        .latest()
        .expect("mission triplet");
    assert_eq!(triplet.current.lat, wp1_lat);
    assert!(triplet.next.valid);

    // arrive at the first waypoint
    fixture.publish_position(wp1_lat, wp1_lon, 500.0);
    fixture.step();
    let result = fixture.bus.mission_result.latest().expect("progress");
    assert_eq!(result.seq_current, 1);

    // arrive at the last waypoint
    fixture.publish_position(wp2_lat, wp2_lon, 500.0);
    fixture.step();
    let result = fixture.bus.mission_result.latest().expect("finished");
    assert!(result.finished);
}

#[test]
fn rtl_uses_the_mission_landing_sequence_when_configured() {
    let mut params = Parameters::default();
    params.rtl_type = RtlType::MissionLanding;
    let mut fixture = Fixture::new(params);
    fixture.publish_home(47.0, 8.0, 488.0);
    fixture.publish_position(47.0, 8.0, 520.0);

    let (land_lat, land_lon) = geo::project(47.0, 8.0, 1.5, 300.0);
    let plan = MissionPlan {
        instance_count: 1,
        items: vec![
            MissionItem::waypoint(47.0, 8.0, 520.0),
            MissionItem {
                command: MissionCommand::LandStart,
                ..MissionItem::waypoint(land_lat, land_lon, 510.0)
            },
            MissionItem {
                command: MissionCommand::Land,
                ..MissionItem::waypoint(land_lat, land_lon, 488.0)
            },
        ],
    };
    fixture.bus.mission_plan.publish(plan);
    fixture.step();

    fixture.set_nav_state(NavState::AutoRtl);
    fixture.step();
    let triplet = fixture
        .bus
        .position_setpoint_triplet
        .latest()
        .expect("rtl triplet");
    assert_eq!(triplet.current.lat, land_lat);
    assert_eq!(triplet.current.lon, land_lon);
}

#[test]
fn rtl_reversed_flies_the_visited_items_backwards() {
    let mut params = Parameters::default();
    params.rtl_type = RtlType::MissionLandingReversed;
    let mut fixture = Fixture::new(params);
    fixture.publish_home(47.0, 8.0, 488.0);
    fixture.publish_position(47.0, 8.0, 500.0);

    let (wp1_lat, wp1_lon) = geo::project(47.0, 8.0, 0.0, 200.0);
    let plan = MissionPlan {
        instance_count: 1,
        items: vec![
            MissionItem::waypoint(wp1_lat, wp1_lon, 500.0),
            MissionItem {
                command: MissionCommand::LandStart,
                ..MissionItem::waypoint(47.0, 8.0, 495.0)
            },
            MissionItem {
                command: MissionCommand::Land,
                ..MissionItem::waypoint(47.0, 8.0, 488.0)
            },
        ],
    };
    fixture.bus.mission_plan.publish(plan);
    fixture.step();

    fixture.set_nav_state(NavState::AutoMission);
    fixture.step();

    fixture.set_nav_state(NavState::AutoRtl);
    fixture.step();
    // first reversed target is the item the mission was pursuing
    let triplet = fixture
        .bus
        .position_setpoint_triplet
        .latest()
        .expect("reversed triplet");
    assert_eq!(triplet.current.lat, wp1_lat);
    assert_eq!(triplet.current.lon, wp1_lon);
}

#[test]
fn rtl_without_mission_landing_falls_back_to_direct() {
    let mut params = Parameters::default();
    params.rtl_type = RtlType::MissionLanding;
    let mut fixture = Fixture::new(params);
    fixture.publish_home(47.0, 8.0, 488.0);
    let (lat, lon) = geo::project(47.0, 8.0, 0.5, 500.0);
    fixture.publish_position(lat, lon, 520.0);

    fixture.set_nav_state(NavState::AutoRtl);
    fixture.step();
    // direct flavour starts with the climb at the current position
    let triplet = fixture
        .bus
        .position_setpoint_triplet
        .latest()
        .expect("climb triplet");
    assert!((triplet.current.lat - lat).abs() < 1e-9);
    assert!((triplet.current.alt - (488.0 + 60.0)).abs() < 0.01);
}

#[test]
fn geofence_breach_engages_the_corrective_loiter() {
    let mut fixture = Fixture::new(Parameters::default());
    fixture.publish_home(47.0, 8.0, 488.0);
    let (lat, lon) = geo::project(47.0, 8.0, 0.0, 250.0);
    fixture.publish_position(lat, lon, 520.0);
    fixture.bus.local_position.publish(LocalPosition {
        v_xy_valid: true,
        vx: 5.0,
        vy: 0.0,
        timestamp: fixture.now,
        ..Default::default()
    });

    fixture.set_nav_state(NavState::AutoLoiter);
    fixture.bus.geofence_result.publish(GeofenceResult {
        breached: true,
        predicted: true,
        max_distance_exceeded: true,
        max_altitude_exceeded: false,
        action: GeofenceAction::Hold,
        timestamp: fixture.now,
    });
    fixture.step();

    assert!(fixture.navigator.geofence_loiter_on());
    let triplet = fixture
        .bus
        .position_setpoint_triplet
        .latest()
        .expect("corrective triplet");
    assert_eq!(triplet.current.setpoint_type, SetpointType::Loiter);
    let corrected_distance =
        geo::distance_m(triplet.current.lat, triplet.current.lon, 47.0, 8.0);
    let original_distance = geo::distance_m(lat, lon, 47.0, 8.0);
    assert!(corrected_distance < original_distance);
}
