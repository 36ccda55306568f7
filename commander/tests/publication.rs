//! Publication contract of the commander
//!
//! Ordering within a tick, the periodic republish, idempotent mode
//! selection, and the one-ACK-per-command rule.

use uas_commander::{Commander, CommanderConfig, PUBLISH_INTERVAL};
use uas_core_shared::bus::FlightBus;
use uas_core_shared::command::{AckResult, CommandId, VehicleCommand};
use uas_core_shared::params::Parameters;
use uas_core_shared::sensors::{AttitudeSample, GlobalPosition, LandDetected, LocalPosition, ManualControl};
use uas_core_shared::time::{Duration, Timestamp};
use uas_core_shared::types::MainState;

const STEP: Duration = Duration::from_millis(20);

struct Fixture {
    bus: FlightBus,
    commander: Commander,
    now: Timestamp,
}

impl Fixture {
    fn new() -> Self {
        let bus = FlightBus::new();
        let commander = Commander::new(&bus, Parameters::default(), CommanderConfig::default());
        Self {
            bus,
            commander,
            now: Timestamp::ZERO,
        }
    }

    fn step(&mut self) {
        self.now = self.now + STEP;
        self.bus.attitude.publish(AttitudeSample {
            timestamp: self.now,
            ..Default::default()
        });
        self.bus.global_position.publish(GlobalPosition {
            lat: 47.3977,
            lon: 8.5456,
            alt: 488.0,
            timestamp: self.now,
        });
        self.bus.local_position.publish(LocalPosition {
            xy_valid: true,
            z_valid: true,
            v_xy_valid: true,
            v_z_valid: true,
            timestamp: self.now,
            ..Default::default()
        });
        self.bus.land_detected.publish(LandDetected {
            landed: true,
            maybe_landed: true,
            ground_contact: true,
            timestamp: self.now,
        });
        self.bus.manual_control.publish(ManualControl {
            timestamp: self.now,
            ..Default::default()
        });
        self.commander.tick(self.now);
    }

    fn boot(&mut self) {
        for _ in 0..35 {
            self.step();
        }
    }
}

#[test]
fn actuator_armed_is_published_first() {
    let mut fixture = Fixture::new();
    fixture.step();

    let armed_seq = fixture.bus.actuator_armed.publish_seq();
    let control_seq = fixture.bus.control_mode.publish_seq();
    let status_seq = fixture.bus.vehicle_status.publish_seq();
    assert!(armed_seq > 0, "first tick must publish");
    assert!(armed_seq < control_seq);
    assert!(armed_seq < status_seq);

    // force a change and check the ordering again
    fixture.boot();
    fixture
        .bus
        .vehicle_command
        .push(VehicleCommand::arm_disarm(true, false));
    for _ in 0..5 {
        fixture.step();
    }
    assert!(fixture.commander.status().is_armed());
    let armed_seq = fixture.bus.actuator_armed.publish_seq();
    let control_seq = fixture.bus.control_mode.publish_seq();
    let status_seq = fixture.bus.vehicle_status.publish_seq();
    assert!(armed_seq < control_seq);
    assert!(armed_seq < status_seq);
}

#[test]
fn status_republishes_every_half_second_without_changes() {
    let mut fixture = Fixture::new();
    fixture.boot();

    let mut status_sub = fixture.bus.vehicle_status.subscribe();
    // settle: consume whatever the boot produced
    for _ in 0..60 {
        fixture.step();
    }
    let _ = status_sub.updated();

    let mut intervals = Vec::new();
    let mut last = None;
    while intervals.len() < 4 {
        fixture.step();
        if status_sub.updated().is_some() {
            if let Some(previous) = last {
                intervals.push(fixture.now.elapsed_since(previous));
            }
            last = Some(fixture.now);
        }
    }

    for interval in intervals {
        let millis = interval.as_millis();
        assert!(
            (450..=550).contains(&millis),
            "republish interval {millis} ms outside 500 ±50"
        );
    }
    assert_eq!(PUBLISH_INTERVAL, Duration::from_millis(500));
}

#[test]
fn idempotent_mode_selection_does_not_bump_the_counter() {
    let mut fixture = Fixture::new();
    fixture.boot();

    fixture
        .bus
        .vehicle_command
        .push(VehicleCommand::set_mode(MainState::Posctl));
    for _ in 0..5 {
        fixture.step();
    }
    let ack = fixture.bus.command_ack.pop().expect("first ack");
    assert_eq!(ack.result, AckResult::Accepted);
    let state = fixture
        .bus
        .commander_state
        .latest()
        .expect("commander state published");
    assert_eq!(state.main_state, MainState::Posctl);
    let changes_before = state.main_state_changes;

    fixture
        .bus
        .vehicle_command
        .push(VehicleCommand::set_mode(MainState::Posctl));
    for _ in 0..5 {
        fixture.step();
    }
    let ack = fixture.bus.command_ack.pop().expect("second ack");
    assert_eq!(ack.result, AckResult::Accepted);
    let state = fixture
        .bus
        .commander_state
        .latest()
        .expect("commander state published");
    assert_eq!(state.main_state_changes, changes_before);
}

#[test]
fn every_handled_command_gets_exactly_one_ack() {
    let mut fixture = Fixture::new();
    fixture.boot();

    let commands = vec![
        VehicleCommand::set_mode(MainState::Posctl),
        VehicleCommand::arm_disarm(true, false),
        VehicleCommand::new(CommandId::RunPrearmChecks),
        VehicleCommand::reboot_shutdown(1), // denied while armed
        VehicleCommand::arm_disarm(false, false),
        VehicleCommand::new(CommandId::StartRxPair),
    ];
    let expected = commands.len();
    for cmd in commands {
        fixture.bus.vehicle_command.push(cmd);
    }
    for _ in 0..60 {
        fixture.step();
    }

    let mut acks = 0;
    while fixture.bus.command_ack.pop().is_some() {
        acks += 1;
    }
    assert_eq!(acks, expected);
}

#[test]
fn commands_for_other_systems_are_ignored_without_ack() {
    let mut fixture = Fixture::new();
    fixture.boot();

    let mut cmd = VehicleCommand::arm_disarm(true, false);
    cmd.target_system = 99;
    fixture.bus.vehicle_command.push(cmd);
    for _ in 0..10 {
        fixture.step();
    }
    assert!(fixture.bus.command_ack.pop().is_none());
    assert!(!fixture.commander.status().is_armed());
}
