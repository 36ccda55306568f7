//! Composition root and bench simulation
//!
//! The [`Vehicle`] owns the bus, the commander, and the navigator; no
//! subsystem reaches for a global. The [`Harness`] wraps a vehicle with
//! a simulated clock and a small kinematic truth model, republishing the
//! sensor topics every step so estimate freshness behaves like a live
//! system. End-to-end tests and the CLI both drive it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

use uas_core_shared::bus::FlightBus;
use uas_core_shared::geo;
use uas_core_shared::params::Parameters;
use uas_core_shared::sensors::{
    AttitudeSample, BatteryStatus, GlobalPosition, GpsPosition, LandDetected, LinkRole,
    LocalPosition, ManualControl, TelemetryHeartbeat, VtolStatus, WindSample,
};
use uas_core_shared::setpoint::SetpointType;
use uas_core_shared::time::{Duration, Timestamp};
use uas_core_shared::types::BatteryWarning;

use uas_commander::{Commander, CommanderConfig};
use uas_navigator::Navigator;

/// Simulation step, matching the commander tick period
pub const STEP: Duration = Duration::from_millis(20);

/// Horizontal cruise speed of the truth model, m/s
const SIM_CRUISE_SPEED: f32 = 5.0;
/// Climb and sink rate of the truth model, m/s
const SIM_CLIMB_RATE: f32 = 2.0;
/// Above this height over ground the model reports airborne
const SIM_AIRBORNE_HEIGHT: f32 = 0.3;

/// One complete vehicle: bus, commander, and navigator
#[derive(Debug)]
pub struct Vehicle {
    /// The typed topic registry
    pub bus: FlightBus,
    /// The supervisory state machine
    pub commander: Commander,
    /// The mission executor
    pub navigator: Navigator,
}

impl Vehicle {
    /// Construct and wire a vehicle
    pub fn new(params: Parameters, config: CommanderConfig) -> Self {
        let bus = FlightBus::new();
        let commander = Commander::new(&bus, params.clone(), config);
        let navigator = Navigator::new(&bus, params);
        Self {
            bus,
            commander,
            navigator,
        }
    }

    /// Advance both tasks one tick, commander first
    pub fn tick(&mut self, now: Timestamp) {
        self.commander.tick(now);
        self.navigator.tick(now);
    }
}

/// Ground-truth state of the simulated vehicle
#[derive(Debug, Clone)]
pub struct Truth {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Altitude in metres above mean sea level
    pub alt: f32,
    /// Terrain altitude under the vehicle
    pub ground_alt: f32,
    /// North/east velocity of the last step, m/s
    pub velocity: (f32, f32),
    /// Vertical velocity of the last step, down positive, m/s
    pub vz: f32,
    /// On the ground
    pub landed: bool,
    /// Roll and pitch in radians
    pub attitude: (f32, f32),
    /// Publish the attitude stream (sensors alive)
    pub attitude_valid: bool,
    /// Throttle stick position published with the manual stream
    pub throttle: f32,
    /// Publish the manual control stream (RC link alive)
    pub rc_connected: bool,
    /// Send a ground station heartbeat every step
    pub gcs_connected: bool,
    /// Battery record published every step
    pub battery: BatteryStatus,
    /// Wind estimate, when one should be published
    pub wind: Option<(f32, f32)>,
    /// VTOL transition state, when one should be published
    pub vtol: Option<VtolStatus>,
    /// Follow the published setpoint triplet kinematically
    pub fly_setpoints: bool,
}

impl Default for Truth {
    fn default() -> Self {
        Self {
            lat: 47.3977,
            lon: 8.5456,
            alt: 488.0,
            ground_alt: 488.0,
            velocity: (0.0, 0.0),
            vz: 0.0,
            landed: true,
            attitude: (0.0, 0.0),
            attitude_valid: true,
            throttle: 0.0,
            rc_connected: true,
            gcs_connected: true,
            battery: BatteryStatus {
                warning: BatteryWarning::None,
                remaining: 1.0,
                remaining_time: None,
                timestamp: Timestamp::ZERO,
            },
            wind: None,
            vtol: None,
            fly_setpoints: true,
        }
    }
}

/// A vehicle under a simulated clock and truth model
#[derive(Debug)]
pub struct Harness {
    /// The vehicle under test
    pub vehicle: Vehicle,
    /// Ground truth fed to the sensor topics every step
    pub truth: Truth,
    /// Current simulated time
    pub now: Timestamp,
}

impl Harness {
    /// A harness with the default truth model
    pub fn new(params: Parameters, config: CommanderConfig) -> Self {
        Self {
            vehicle: Vehicle::new(params, config),
            truth: Truth::default(),
            now: Timestamp::ZERO,
        }
    }

    /// Advance one step: move the truth model, republish the sensor
    /// topics, then tick the vehicle
    pub fn step(&mut self) {
        self.now = self.now + STEP;
        if self.truth.fly_setpoints {
            self.simulate_motion();
        }
        self.publish_truth();
        self.vehicle.tick(self.now);
    }

    /// Advance by a duration
    pub fn run_for(&mut self, duration: Duration) {
        let steps = duration.as_micros() / STEP.as_micros();
        for _ in 0..steps.max(1) {
            self.step();
        }
    }

    /// Advance until the predicate holds or the timeout elapses
    pub fn run_until(
        &mut self,
        timeout: Duration,
        mut predicate: impl FnMut(&mut Harness) -> bool,
    ) -> bool {
        let deadline = self.now + timeout;
        while self.now < deadline {
            self.step();
            if predicate(self) {
                return true;
            }
        }
        false
    }

    fn simulate_motion(&mut self) {
        if !self.vehicle.commander.status().is_armed() {
            self.truth.velocity = (0.0, 0.0);
            self.truth.vz = 0.0;
            return;
        }
        let Some(triplet) = self.vehicle.bus.position_setpoint_triplet.latest() else {
            return;
        };
        let setpoint = triplet.current;
        if !setpoint.valid {
            return;
        }
        let dt = STEP.as_secs_f32();

        match setpoint.setpoint_type {
            SetpointType::Idle => {}
            SetpointType::Land => {
                // descend onto the target position
                self.move_towards(setpoint.lat, setpoint.lon, dt);
                let step_down = SIM_CLIMB_RATE * dt;
                self.truth.alt = (self.truth.alt - step_down).max(self.truth.ground_alt);
                self.truth.vz = SIM_CLIMB_RATE;
                if self.truth.alt - self.truth.ground_alt < SIM_AIRBORNE_HEIGHT {
                    self.truth.landed = true;
                    self.truth.vz = 0.0;
                }
            }
            SetpointType::Takeoff | SetpointType::Position | SetpointType::Loiter => {
                self.move_towards(setpoint.lat, setpoint.lon, dt);
                let diff = setpoint.alt - self.truth.alt;
                let step_climb = SIM_CLIMB_RATE * dt;
                if diff.abs() <= step_climb {
                    self.truth.alt = setpoint.alt;
                    self.truth.vz = 0.0;
                } else {
                    self.truth.alt += step_climb * diff.signum();
                    self.truth.vz = -SIM_CLIMB_RATE * diff.signum();
                }
                if self.truth.alt - self.truth.ground_alt > SIM_AIRBORNE_HEIGHT {
                    self.truth.landed = false;
                }
            }
        }
    }

    fn move_towards(&mut self, lat: f64, lon: f64, dt: f32) {
        let distance = geo::distance_m(self.truth.lat, self.truth.lon, lat, lon);
        let step = f64::from(SIM_CRUISE_SPEED * dt);
        if distance <= 0.01 {
            self.truth.velocity = (0.0, 0.0);
            return;
        }
        let bearing = geo::bearing_rad(self.truth.lat, self.truth.lon, lat, lon);
        let travel = step.min(distance);
        let (new_lat, new_lon) = geo::project(self.truth.lat, self.truth.lon, bearing, travel);
        self.truth.lat = new_lat;
        self.truth.lon = new_lon;
        let speed = (travel / f64::from(dt)) as f32;
        self.truth.velocity = (speed * bearing.cos() as f32, speed * bearing.sin() as f32);
    }

    fn publish_truth(&mut self) {
        let now = self.now;
        let truth = &self.truth;
        let bus = &self.vehicle.bus;

        bus.global_position.publish(GlobalPosition {
            lat: truth.lat,
            lon: truth.lon,
            alt: truth.alt,
            timestamp: now,
        });
        bus.gps_position.publish(GpsPosition {
            lat: truth.lat,
            lon: truth.lon,
            alt: truth.alt,
            fix_type: 4,
            satellites_used: 12,
            timestamp: now,
        });
        bus.local_position.publish(LocalPosition {
            xy_valid: true,
            z_valid: true,
            v_xy_valid: true,
            v_z_valid: true,
            x: 0.0,
            y: 0.0,
            z: truth.ground_alt - truth.alt,
            vx: truth.velocity.0,
            vy: truth.velocity.1,
            vz: truth.vz,
            heading: 0.0,
            timestamp: now,
        });
        bus.land_detected.publish(LandDetected {
            landed: truth.landed,
            maybe_landed: truth.landed,
            ground_contact: truth.landed,
            timestamp: now,
        });
        if truth.attitude_valid {
            bus.attitude.publish(AttitudeSample {
                roll: truth.attitude.0,
                pitch: truth.attitude.1,
                timestamp: now,
            });
        }
        if truth.rc_connected {
            bus.manual_control.publish(ManualControl {
                x: 0.0,
                y: 0.0,
                r: 0.0,
                throttle: truth.throttle,
                timestamp: now,
            });
        }
        if truth.gcs_connected {
            bus.telemetry_heartbeat.push(TelemetryHeartbeat {
                role: LinkRole::Gcs,
                timestamp: now,
            });
        }
        let mut battery = truth.battery;
        battery.timestamp = now;
        bus.battery_status.publish(battery);
        if let Some((north, east)) = truth.wind {
            bus.wind.publish(WindSample {
                north,
                east,
                timestamp: now,
            });
        }
        if let Some(mut vtol) = truth.vtol {
            vtol.timestamp = now;
            bus.vtol_status.publish(vtol);
        }
    }
}

/// Convenience accessors used by tests and the CLI
impl Harness {
    /// Latest published navigation state
    pub fn nav_state(&self) -> uas_core_shared::types::NavState {
        self.vehicle.commander.status().nav_state
    }

    /// Whether the vehicle is armed
    pub fn armed(&self) -> bool {
        self.vehicle.commander.status().is_armed()
    }

    /// Drain all pending acknowledgements
    pub fn take_acks(&mut self) -> Vec<uas_core_shared::command::CommandAck> {
        let mut acks = Vec::new();
        while let Some(ack) = self.vehicle.bus.command_ack.pop() {
            acks.push(ack);
        }
        acks
    }

    /// Drain all pending operator events
    pub fn take_events(&mut self) -> Vec<uas_core_shared::events::Event> {
        let mut events = Vec::new();
        while let Some(event) = self.vehicle.bus.events.pop() {
            events.push(event);
        }
        events
    }
}
