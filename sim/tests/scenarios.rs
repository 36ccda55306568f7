//! End-to-end scenarios over the full vehicle
//!
//! Commander and navigator run against the real bus under the simulated
//! clock and truth model; scenarios follow the operational scripts the
//! system is expected to survive.

use uas_commander::CommanderConfig;
use uas_core_shared::command::{
    ActionRequest, ActionSource, CommandId, RequestedAction, VehicleCommand,
    ARM_DISARM_FORCE_MAGIC,
};
use uas_core_shared::geo;
use uas_core_shared::mission::{MissionItem, MissionPlan};
use uas_core_shared::params::Parameters;
use uas_core_shared::setpoint::SetpointType;
use uas_core_shared::time::Duration;
use uas_core_shared::types::{ArmingState, GeofenceAction, MainState, NavState};
use uas_flight_sim::Harness;

fn harness() -> Harness {
    Harness::new(Parameters::default(), CommanderConfig::default())
}

fn boot(harness: &mut Harness) {
    harness.run_for(Duration::from_millis(700));
    assert_eq!(
        harness.vehicle.commander.status().arming_state,
        ArmingState::Standby,
        "vehicle must reach standby after boot"
    );
}

fn issue(harness: &mut Harness, mut cmd: VehicleCommand) -> uas_core_shared::command::AckResult {
    cmd.from_external = true;
    cmd.timestamp = harness.now;
    harness.vehicle.bus.vehicle_command.push(cmd);
    let mut result = None;
    assert!(
        harness.run_until(Duration::from_secs(2), |h| {
            if let Some(ack) = h.vehicle.bus.command_ack.pop() {
                result = Some(ack.result);
                true
            } else {
                false
            }
        }),
        "command was never acknowledged"
    );
    result.expect("ack recorded")
}

fn accepted(harness: &mut Harness, cmd: VehicleCommand) {
    let result = issue(harness, cmd);
    assert_eq!(result, uas_core_shared::command::AckResult::Accepted);
}

/// Ground arm, takeoff, loiter handoff, scripted landing, auto-disarm
#[test]
fn s1_ground_arm_takeoff_land_auto_disarm() {
    let mut harness = harness();
    boot(&mut harness);
    let ground_alt = harness.truth.alt;

    accepted(&mut harness, VehicleCommand::set_mode(MainState::AutoTakeoff));
    accepted(&mut harness, VehicleCommand::arm_disarm(true, false));
    assert!(harness.armed());
    assert_eq!(harness.nav_state(), NavState::AutoTakeoff);

    // the climb leaves the ground and completes into a hold
    assert!(
        harness.run_until(Duration::from_secs(10), |h| !h.truth.landed),
        "never became airborne"
    );
    assert!(
        harness.run_until(Duration::from_secs(30), |h| h.nav_state()
            == NavState::AutoLoiter),
        "takeoff never handed over to the hold"
    );
    let triplet = harness
        .vehicle
        .bus
        .position_setpoint_triplet
        .latest()
        .expect("triplet");
    assert_eq!(triplet.current.setpoint_type, SetpointType::Loiter);
    assert!((triplet.current.alt - (ground_alt + 2.5)).abs() < 0.5);

    // scripted landing: the detector reports landed and stays landed
    harness.truth.fly_setpoints = false;
    harness.truth.landed = true;
    harness.truth.alt = ground_alt;
    while harness.vehicle.bus.events.pop().is_some() {}

    assert!(
        harness.run_until(Duration::from_secs(4), |h| !h.armed()),
        "auto disarm never fired"
    );
    let events = harness.take_events();
    assert!(
        events.iter().any(|e| e.id == "auto_disarm_land"),
        "disarm must be attributed to the landing timer"
    );
}

/// Kill switch in the air: lockdown, parachute, delayed disarm
#[test]
fn s2_kill_switch_in_air() {
    let mut harness = harness();
    boot(&mut harness);
    accepted(&mut harness, VehicleCommand::set_mode(MainState::AutoTakeoff));
    accepted(&mut harness, VehicleCommand::arm_disarm(true, false));
    assert!(
        harness.run_until(Duration::from_secs(10), |h| !h.truth.landed),
        "never became airborne"
    );

    harness.vehicle.bus.action_request.push(ActionRequest {
        source: ActionSource::RcSwitch,
        action: RequestedAction::Kill,
        mode: None,
        timestamp: harness.now,
    });
    harness.run_for(Duration::from_millis(100));

    let armed_record = harness
        .vehicle
        .bus
        .actuator_armed
        .latest()
        .expect("actuator armed");
    assert!(armed_record.manual_lockdown);

    let parachute = harness
        .vehicle
        .bus
        .command_out
        .pop()
        .expect("parachute command published");
    assert_eq!(parachute.command, CommandId::ParachuteRelease);
    assert_eq!(
        parachute.target_component,
        uas_core_shared::command::DEFAULT_PARACHUTE_COMPONENT
    );

    let mut saw_parachute_tune = false;
    while let Some(tune) = harness.vehicle.bus.tune_control.pop() {
        if tune.tune == uas_core_shared::events::TuneId::ParachuteRelease {
            saw_parachute_tune = true;
        }
    }
    assert!(saw_parachute_tune);

    // the held switch disarms after the five second hysteresis
    assert!(
        harness.run_until(Duration::from_secs(6), |h| !h.armed()),
        "kill switch never disarmed"
    );
    let events = harness.take_events();
    assert!(events.iter().any(|e| e.id == "kill_switch"));
}

/// GCS link loss in a mission with RC still alive
#[test]
fn s3_gcs_link_loss_with_rc_present() {
    let mut harness = harness();
    boot(&mut harness);

    // a two-waypoint mission far from home
    let (wp1_lat, wp1_lon) = geo::project(harness.truth.lat, harness.truth.lon, 0.0, 400.0);
    let (wp2_lat, wp2_lon) = geo::project(harness.truth.lat, harness.truth.lon, 0.0, 800.0);
    let ground_alt = harness.truth.alt;
    harness.vehicle.bus.mission_plan.publish(MissionPlan {
        instance_count: 1,
        items: vec![
            MissionItem::waypoint(wp1_lat, wp1_lon, ground_alt + 30.0),
            MissionItem::waypoint(wp2_lat, wp2_lon, ground_alt + 30.0),
        ],
    });
    harness.run_for(Duration::from_millis(200));

    accepted(&mut harness, VehicleCommand::set_mode(MainState::AutoTakeoff));
    accepted(&mut harness, VehicleCommand::arm_disarm(true, false));
    assert!(harness.run_until(Duration::from_secs(30), |h| h.nav_state()
        == NavState::AutoLoiter));
    accepted(&mut harness, VehicleCommand::set_mode(MainState::AutoMission));
    assert_eq!(harness.nav_state(), NavState::AutoMission);

    while harness.vehicle.bus.events.pop().is_some() {}

    // the ground station goes quiet; RC stays alive
    harness.truth.gcs_connected = false;
    assert!(
        harness.run_until(Duration::from_secs(12), |h| h.nav_state()
            == NavState::AutoRtl),
        "link loss never engaged the return"
    );
    assert!(harness.vehicle.commander.status().failsafe);

    let events = harness.take_events();
    let lost_events = events
        .iter()
        .filter(|e| e.id == "commander_gcs_lost")
        .count();
    assert_eq!(lost_events, 1, "exactly one link-loss event");
}

/// Forced arm with failing preflight checks
#[test]
fn s4_force_arm_despite_failed_checks() {
    let mut harness = harness();
    harness.truth.attitude_valid = false;
    harness.run_for(Duration::from_millis(700));
    assert_eq!(
        harness.vehicle.commander.status().arming_state,
        ArmingState::Init,
        "checks must fail without sensors"
    );

    assert_eq!(
        issue(&mut harness, VehicleCommand::arm_disarm(true, false)),
        uas_core_shared::command::AckResult::Denied
    );

    let mut forced = VehicleCommand::arm_disarm(true, false);
    forced.param2 = ARM_DISARM_FORCE_MAGIC;
    accepted(&mut harness, forced);
    assert!(harness.armed());
    assert!(harness.vehicle.commander.status().armed_at.is_some());

    let home = harness
        .vehicle
        .bus
        .home_position
        .latest()
        .expect("home published");
    assert!(home.valid, "home set on arming past the boot holdoff");
}

/// Predicted geofence breach while flying towards the boundary
#[test]
fn s5_geofence_predicted_breach() {
    let mut params = Parameters::default();
    params.geofence_action = GeofenceAction::Hold;
    params.geofence_max_distance = 200.0;
    let mut harness = Harness::new(params, CommanderConfig::default());
    boot(&mut harness);
    let home_lat = harness.truth.lat;
    let home_lon = harness.truth.lon;

    accepted(&mut harness, VehicleCommand::set_mode(MainState::AutoTakeoff));
    accepted(&mut harness, VehicleCommand::arm_disarm(true, false));
    assert!(harness.run_until(Duration::from_secs(30), |h| h.nav_state()
        == NavState::AutoLoiter));

    // send the vehicle towards a point beyond the fence
    let (out_lat, out_lon) = geo::project(home_lat, home_lon, 0.0, 260.0);
    let alt = harness.truth.alt;
    accepted(
        &mut harness,
        VehicleCommand::reposition(out_lat, out_lon, alt, 1),
    );

    assert!(
        harness.run_until(Duration::from_secs(120), |h| h
            .vehicle
            .navigator
            .geofence_loiter_on()),
        "corrective loiter never engaged"
    );
    let fence = harness
        .vehicle
        .bus
        .geofence_result
        .latest()
        .expect("geofence verdict");
    assert!(fence.breached);

    let triplet = harness
        .vehicle
        .bus
        .position_setpoint_triplet
        .latest()
        .expect("triplet");
    assert_eq!(triplet.current.setpoint_type, SetpointType::Loiter);
    let distance = geo::distance_m(triplet.current.lat, triplet.current.lon, home_lat, home_lon);
    assert!(
        distance < 200.0,
        "corrective point must sit inside the fence, got {distance:.0} m"
    );
}

/// Reboot request while armed is refused
#[test]
fn s6_reboot_denied_while_armed() {
    let mut harness = harness();
    boot(&mut harness);
    accepted(&mut harness, VehicleCommand::set_mode(MainState::AutoTakeoff));
    accepted(&mut harness, VehicleCommand::arm_disarm(true, false));
    assert!(harness.run_until(Duration::from_secs(10), |h| !h.truth.landed));

    let result = issue(&mut harness, VehicleCommand::reboot_shutdown(1));
    assert_eq!(result, uas_core_shared::command::AckResult::Denied);
    assert!(harness.armed(), "the vehicle must stay armed");
    assert!(!harness.vehicle.commander.should_exit());
}
