//! The commander tick loop
//!
//! A fixed-period cooperative supervisor. Each tick snapshots the input
//! topics, updates the monitors and the failure detector, processes at
//! most one pending command and one action request, advances the arm and
//! main state machines, resolves the failsafe decision, recomputes the
//! control mode, and publishes all outputs whenever a field changed or
//! the republish interval elapsed. `actuator_armed` always leaves first
//! so output modules observe a consistent arm state.

use uas_core_shared::bus::{CommandQueue, FlightBus, PowerButtonQueue, Subscription, Topic};
use uas_core_shared::command::{ActionRequest, CommandAck, VehicleCommand};
use uas_core_shared::events::{Event, LedColor, LedControl, LedMode, Severity, TuneControl, TuneId};
use uas_core_shared::hysteresis::Hysteresis;
use uas_core_shared::mission::MissionResult;
use uas_core_shared::params::Parameters;
use uas_core_shared::sensors::{
    AttitudeSample, BatteryStatus, CpuLoad, EscStatus, GlobalPosition, GpsPosition, LandDetected,
    LocalPosition, ManualControl, OffboardControlMode, PowerButtonEvent, SafetySwitch, SystemPower,
    TelemetryHeartbeat, TransponderReport, VibrationMetrics, VtolStatus, WindSample,
};
use uas_core_shared::setpoint::VehicleRoi;
use uas_core_shared::status::{
    ActuatorArmed, CommanderState, FailsafeCause, FailureFlags, GeofenceResult, HomePosition,
    StatusFlags, VehicleControlMode, VehicleStatus,
};
use uas_core_shared::time::{Duration, Timestamp};
use uas_core_shared::types::{
    ArmingState, BatteryWarning, FailsafeAction, MainState, NavState, TransitionResult,
    VehicleType,
};

use crate::arm_state::{ArmContext, ArmStateMachine};
use crate::checks::{self, HealthReport};
use crate::control_mode::{control_mode_for, led_for, LedInputs};
use crate::failsafe::{self, FailsafeInputs};
use crate::failure_detector::{FailureDetector, FailureDetectorInputs};
use crate::flight_log::FlightLog;
use crate::flight_mode::{MainStateMachine, ModeContext};
use crate::home::HomeManager;
use crate::monitors::{
    AutoDisarm, BatteryMonitor, BatteryState, GeofenceMonitor, LinkMonitor, LinkState, WindMonitor,
};
use crate::worker::Worker;

/// Supervisor tick period
pub const TICK_INTERVAL: Duration = Duration::from_millis(20);
/// Outputs are republished at least this often even without changes
pub const PUBLISH_INTERVAL: Duration = Duration::from_millis(500);
/// Staleness bound for position estimates
const ESTIMATE_TIMEOUT: Duration = Duration::from_secs(1);
/// Minimum spacing of "mode not available" notifications
const MODE_DENIED_NOTIFY_INTERVAL: Duration = Duration::from_secs(2);
/// Minimum spacing of traffic proximity warnings
const TRAFFIC_WARN_INTERVAL: Duration = Duration::from_secs(10);
/// Horizontal distance below which traffic is announced
const TRAFFIC_WARN_DISTANCE_M: f64 = 500.0;
/// Vertical distance below which traffic is announced
const TRAFFIC_WARN_ALTITUDE_M: f32 = 100.0;

/// Static configuration of one commander instance
#[derive(Debug, Clone)]
pub struct CommanderConfig {
    /// System id of this vehicle
    pub system_id: u8,
    /// Component id of the supervisory core
    pub component_id: u8,
    /// Airframe class
    pub vehicle_type: VehicleType,
    /// Target component of the parachute trigger command
    pub parachute_component_id: u8,
    /// Where the flight counter persists, if anywhere
    pub flight_log_path: Option<std::path::PathBuf>,
    /// Where the parameter snapshot persists, if anywhere
    pub param_file: Option<std::path::PathBuf>,
    /// Hardware-in-the-loop: preflight checks pass without live sensors
    pub hil: bool,
}

impl Default for CommanderConfig {
    fn default() -> Self {
        Self {
            system_id: 1,
            component_id: 1,
            vehicle_type: VehicleType::RotaryWing,
            parachute_component_id: uas_core_shared::command::DEFAULT_PARACHUTE_COMPONENT,
            flight_log_path: None,
            param_file: None,
            hil: false,
        }
    }
}

/// Snapshot of the last published output set, for change detection
#[derive(Debug, Clone, PartialEq)]
struct PublishedSet {
    status: VehicleStatus,
    flags: StatusFlags,
    armed: ActuatorArmed,
    control: VehicleControlMode,
    commander_state: CommanderState,
    failure: FailureFlags,
}

/// The supervisory state machine
#[derive(Debug)]
pub struct Commander {
    pub(crate) config: CommanderConfig,
    pub(crate) params: Parameters,

    // queues
    pub(crate) commands_in: CommandQueue<VehicleCommand>,
    pub(crate) actions_in: CommandQueue<ActionRequest>,
    pub(crate) acks_out: CommandQueue<CommandAck>,
    pub(crate) events_out: CommandQueue<Event>,
    pub(crate) tunes_out: CommandQueue<TuneControl>,
    pub(crate) command_out: CommandQueue<VehicleCommand>,
    pub(crate) navigator_out: CommandQueue<VehicleCommand>,
    heartbeats_in: CommandQueue<TelemetryHeartbeat>,
    transponder_in: CommandQueue<TransponderReport>,
    power_button: PowerButtonQueue,

    // input topics
    land_topic: Topic<LandDetected>,
    local_topic: Topic<LocalPosition>,
    global_topic: Topic<GlobalPosition>,
    gps_topic: Topic<GpsPosition>,
    manual_topic: Topic<ManualControl>,
    attitude_topic: Topic<AttitudeSample>,
    esc_topic: Topic<EscStatus>,
    vibration_topic: Topic<VibrationMetrics>,
    offboard_topic: Topic<OffboardControlMode>,
    vtol_topic: Topic<VtolStatus>,
    wind_topic: Topic<WindSample>,
    battery_topic: Topic<BatteryStatus>,
    cpu_topic: Topic<CpuLoad>,
    power_topic: Topic<SystemPower>,
    safety_topic: Topic<SafetySwitch>,
    mission_result_topic: Topic<MissionResult>,
    params_sub: Subscription<Parameters>,

    // output topics
    status_topic: Topic<VehicleStatus>,
    flags_topic: Topic<StatusFlags>,
    armed_topic: Topic<ActuatorArmed>,
    control_topic: Topic<VehicleControlMode>,
    commander_state_topic: Topic<CommanderState>,
    failure_topic: Topic<FailureFlags>,
    home_topic: Topic<HomePosition>,
    geofence_topic: Topic<GeofenceResult>,
    roi_topic: Topic<VehicleRoi>,
    led_topic: Topic<LedControl>,

    // machines and monitors
    pub(crate) arm: ArmStateMachine,
    pub(crate) mode: MainStateMachine,
    pub(crate) detector: FailureDetector,
    pub(crate) link: LinkMonitor,
    battery: BatteryMonitor,
    wind: WindMonitor,
    pub(crate) geofence: GeofenceMonitor,
    auto_disarm: AutoDisarm,
    pub(crate) home: HomeManager,
    pub(crate) worker: Worker,
    flight_log: Option<FlightLog>,

    // live records
    pub(crate) status: VehicleStatus,
    pub(crate) flags: StatusFlags,
    pub(crate) armed_out: ActuatorArmed,
    control: VehicleControlMode,

    // cached inputs
    pub(crate) land: LandDetected,
    pub(crate) local: Option<LocalPosition>,
    pub(crate) global: Option<GlobalPosition>,
    pub(crate) manual: ManualControl,
    pub(crate) mission_result: MissionResult,
    link_state: LinkState,
    battery_state: BatteryState,
    cpu_load: f32,
    attitude_seen: bool,

    // bookkeeping
    pub(crate) health: HealthReport,
    offboard_ready: Hysteresis,
    pub(crate) have_taken_off: bool,
    was_landed: bool,
    prev_arming_state: ArmingState,
    early_takeoff_latched: bool,
    last_cause: Option<FailsafeCause>,
    last_publish: Option<Timestamp>,
    published: Option<PublishedSet>,
    published_home: Option<HomePosition>,
    published_led: Option<(LedColor, LedMode)>,
    mode_denied_at: Option<Timestamp>,
    traffic_warned_at: Option<Timestamp>,
    battery_level_announced: BatteryWarning,
    wind_max_exceeded: bool,
    pub(crate) gps_origin: Option<(f64, f64, f32)>,
    pub(crate) shutdown_requested: bool,
}

impl Commander {
    /// Build a commander wired to the given bus
    pub fn new(bus: &FlightBus, params: Parameters, config: CommanderConfig) -> Self {
        let status = VehicleStatus::at_boot(config.system_id, config.component_id, config.vehicle_type);
        let flight_log = config.flight_log_path.clone().map(FlightLog::open);
        let detector = FailureDetector::new(&params);
        let auto_disarm = AutoDisarm::new(Duration::from_secs_f32(params.disarm_land_delay));
        let offboard_ready = Hysteresis::new(Duration::from_secs_f32(params.offboard_ready_delay));

        Self {
            commands_in: bus.vehicle_command.clone(),
            actions_in: bus.action_request.clone(),
            acks_out: bus.command_ack.clone(),
            events_out: bus.events.clone(),
            tunes_out: bus.tune_control.clone(),
            command_out: bus.command_out.clone(),
            navigator_out: bus.navigator_command.clone(),
            heartbeats_in: bus.telemetry_heartbeat.clone(),
            transponder_in: bus.transponder_report.clone(),
            power_button: bus.power_button.clone(),
            land_topic: bus.land_detected.clone(),
            local_topic: bus.local_position.clone(),
            global_topic: bus.global_position.clone(),
            gps_topic: bus.gps_position.clone(),
            manual_topic: bus.manual_control.clone(),
            attitude_topic: bus.attitude.clone(),
            esc_topic: bus.esc_status.clone(),
            vibration_topic: bus.vibration.clone(),
            offboard_topic: bus.offboard_control_mode.clone(),
            vtol_topic: bus.vtol_status.clone(),
            wind_topic: bus.wind.clone(),
            battery_topic: bus.battery_status.clone(),
            cpu_topic: bus.cpu_load.clone(),
            power_topic: bus.system_power.clone(),
            safety_topic: bus.safety.clone(),
            mission_result_topic: bus.mission_result.clone(),
            params_sub: bus.parameter_update.subscribe(),
            status_topic: bus.vehicle_status.clone(),
            flags_topic: bus.status_flags.clone(),
            armed_topic: bus.actuator_armed.clone(),
            control_topic: bus.control_mode.clone(),
            commander_state_topic: bus.commander_state.clone(),
            failure_topic: bus.failure_flags.clone(),
            home_topic: bus.home_position.clone(),
            geofence_topic: bus.geofence_result.clone(),
            roi_topic: bus.vehicle_roi.clone(),
            led_topic: bus.led_control.clone(),
            arm: ArmStateMachine::new(),
            mode: MainStateMachine::new(),
            detector,
            link: LinkMonitor::new(),
            battery: BatteryMonitor::new(),
            wind: WindMonitor::new(),
            geofence: GeofenceMonitor::new(),
            auto_disarm,
            home: HomeManager::new(),
            worker: Worker::new(),
            flight_log,
            status,
            flags: StatusFlags::default(),
            armed_out: ActuatorArmed::default(),
            control: VehicleControlMode::default(),
            land: LandDetected::default(),
            local: None,
            global: None,
            manual: ManualControl::default(),
            mission_result: MissionResult::default(),
            link_state: LinkState::default(),
            battery_state: BatteryState::default(),
            cpu_load: 0.0,
            attitude_seen: false,
            health: checks::evaluate(&StatusFlags::default(), config.vehicle_type),
            offboard_ready,
            have_taken_off: false,
            was_landed: true,
            prev_arming_state: ArmingState::Init,
            early_takeoff_latched: false,
            last_cause: None,
            last_publish: None,
            published: None,
            published_home: None,
            published_led: None,
            mode_denied_at: None,
            traffic_warned_at: None,
            battery_level_announced: BatteryWarning::None,
            wind_max_exceeded: false,
            gps_origin: None,
            shutdown_requested: false,
            params,
            config,
        }
    }

    /// Whether a shutdown was accepted and the loop should exit
    pub const fn should_exit(&self) -> bool {
        self.shutdown_requested
    }

    /// Whether a command or action request is still queued
    pub fn has_pending_work(&self) -> bool {
        !self.commands_in.is_empty() || !self.actions_in.is_empty()
    }

    /// Current vehicle status snapshot
    pub const fn status(&self) -> &VehicleStatus {
        &self.status
    }

    /// Run one supervisor tick
    pub fn tick(&mut self, now: Timestamp) {
        // Parameters are only re-read while disarmed so a flight runs
        // under one consistent snapshot
        if !self.status.is_armed() {
            if let Some(new_params) = self.params_sub.updated() {
                self.apply_params(new_params, now);
            }
        }

        self.refresh_inputs(now);
        self.update_monitors(now);
        self.update_failure_detector(now);
        self.poll_worker(now);
        self.drain_power_button(now);

        // The boot state retries standby on every tick; denials here are
        // routine and stay silent
        if self.arm.state() == ArmingState::Init {
            let report = self.health;
            let ctx = self.arm_context(&report, false, false);
            let _ = self.arm.request(ArmingState::Standby, &ctx);
        }

        if let Some(cmd) = self.commands_in.pop() {
            self.process_command(cmd, now);
        }
        if let Some(request) = self.actions_in.pop() {
            self.process_action(request, now);
        }

        self.handle_detector_edges(now);
        self.handle_flight_edges(now);
        self.handle_auto_disarm(now);
        self.handle_takeoff_handoff(now);
        self.resolve_failsafe(now);
        self.handle_arming_edges(now);

        self.control = control_mode_for(self.status.nav_state, &self.armed_out);
        self.update_led(now);
        self.publish_outputs(now);
    }

    // ---- input handling -------------------------------------------------

    pub(crate) fn apply_params(&mut self, params: Parameters, now: Timestamp) {
        self.detector.reconfigure(&params);
        self.auto_disarm
            .set_landed_delay(Duration::from_secs_f32(params.disarm_land_delay));
        self.offboard_ready = Hysteresis::new(Duration::from_secs_f32(params.offboard_ready_delay));
        self.params = params;
        self.emit_event("commander_params_applied", Severity::Info, "parameters updated", now);
    }

    fn refresh_inputs(&mut self, now: Timestamp) {
        if let Some(land) = self.land_topic.latest() {
            self.land = land;
        }
        self.local = self.local_topic.latest();
        self.global = self.global_topic.latest();
        if let Some(manual) = self.manual_topic.latest() {
            self.manual = manual;
        }
        if let Some(result) = self.mission_result_topic.latest() {
            self.mission_result = result;
        }
        if self.attitude_topic.latest().is_some() {
            self.attitude_seen = true;
        }
        self.cpu_load = self.cpu_topic.latest().map(|c| c.load).unwrap_or(0.0);

        // estimate validity: fresh and flagged usable by the estimator
        let fresh = |t: Timestamp| now.elapsed_since(t) <= ESTIMATE_TIMEOUT;
        self.flags.global_position_valid = self
            .global
            .map(|g| fresh(g.timestamp) && g.lat.is_finite() && g.lon.is_finite())
            .unwrap_or(false);
        self.flags.local_position_valid = self
            .local
            .map(|l| fresh(l.timestamp) && l.xy_valid && l.z_valid)
            .unwrap_or(false);
        self.flags.local_velocity_valid = self
            .local
            .map(|l| fresh(l.timestamp) && l.v_xy_valid && l.v_z_valid)
            .unwrap_or(false);
        self.flags.gps_valid = self
            .gps_topic
            .latest()
            .map(|g| fresh(g.timestamp) && g.fix_type >= 3)
            .unwrap_or(false);
        self.flags.home_position_valid = self.home.valid();

        // offboard stream freshness feeds both the lost flag and the
        // availability debounce for entering the mode
        let offboard_fresh = self
            .offboard_topic
            .latest()
            .map(|o| now.elapsed_since(o.timestamp) <= Duration::from_secs_f32(self.params.offboard_loss_timeout))
            .unwrap_or(false);
        self.flags.offboard_control_signal_lost = !offboard_fresh;
        self.offboard_ready.set_state_and_update(offboard_fresh, now);

        if let Some(vtol) = self.vtol_topic.latest() {
            self.status.in_transition_mode = vtol.in_transition;
            self.status.in_transition_to_fw = vtol.in_transition_to_fw;
            self.flags.vtol_transition_failure = vtol.quadchute_request;
        }

        if let Some(battery) = self.battery_topic.latest() {
            self.flags.battery_warning = battery.warning;
            self.flags.battery_low_remaining_time = battery.remaining_time;
        }

        self.flags.pre_flight_checks_pass =
            (self.config.hil || self.attitude_seen) && !self.flags.calibration_enabled;

        self.health = checks::evaluate(&self.flags, self.config.vehicle_type);
        self.armed_out.ready_to_arm =
            self.arm.state() == ArmingState::Standby && self.health.prearm_ok;

        self.check_traffic(now);
    }

    fn update_monitors(&mut self, now: Timestamp) {
        while let Some(heartbeat) = self.heartbeats_in.pop() {
            self.link.note_heartbeat(heartbeat.role, heartbeat.timestamp);
        }
        let manual = self.manual;
        let power = self.power_topic.latest();
        self.link_state = self
            .link
            .update(&self.params, Some(&manual), power.as_ref(), now);
        self.status.rc_signal_lost = self.link_state.rc_lost;
        self.status.data_link_lost = self.link_state.data_link_lost;
        self.status.high_latency_data_link_lost = self.link_state.high_latency_lost;
        self.status.usb_connected = self.link_state.usb_connected;

        if self.link_state.gcs_lost_edge {
            self.emit_event(
                "commander_gcs_lost",
                Severity::Warning,
                "ground station link lost",
                now,
            );
        }
        if self.link_state.gcs_regained_edge {
            self.emit_event(
                "commander_gcs_regained",
                Severity::Info,
                "ground station link regained",
                now,
            );
        }
        if self.link_state.rc_lost_edge && self.status.is_armed() {
            self.emit_event(
                "commander_rc_lost",
                Severity::Warning,
                "manual control link lost",
                now,
            );
        }

        let battery = self.battery_topic.latest();
        self.battery_state =
            self.battery
                .update(&self.params, battery.as_ref(), self.status.is_armed(), now);
        if self.battery_state.warning > self.battery_level_announced {
            let severity = match self.battery_state.warning {
                BatteryWarning::Emergency => Severity::Emergency,
                BatteryWarning::Critical => Severity::Critical,
                _ => Severity::Warning,
            };
            self.emit_event(
                "commander_battery_level",
                severity,
                format!("battery level {:?}", self.battery_state.warning),
                now,
            );
            self.tunes_out.push(TuneControl {
                tune: TuneId::BatteryWarningFast,
                timestamp: now,
            });
        }
        self.battery_level_announced = self.battery_state.warning;

        let wind = self.wind_topic.latest();
        let wind_state = self.wind.update(&self.params, wind.as_ref(), now);
        if let Some(speed) = wind_state.warn_speed {
            self.emit_event(
                "commander_wind_warning",
                Severity::Warning,
                format!("wind speed {speed:.1} m/s above warning level"),
                now,
            );
        }
        if wind_state.max_exceeded && !self.wind_max_exceeded && self.status.is_armed() {
            self.emit_event(
                "failsafe_high_wind",
                Severity::Critical,
                "wind speed above limit, returning",
                now,
            );
        }
        self.wind_max_exceeded = wind_state.max_exceeded;

        let home = *self.home.home();
        let global = self.global;
        let local = self.local;
        if let Some(result) = self.geofence.update(
            &self.params,
            &home,
            global.as_ref(),
            local.as_ref(),
            self.config.vehicle_type,
            now,
        ) {
            self.geofence_topic.publish(result);
        }
    }

    fn update_failure_detector(&mut self, now: Timestamp) {
        let inputs = FailureDetectorInputs {
            attitude: self.attitude_topic.latest(),
            local_position: self.local,
            esc: self.esc_topic.latest(),
            vibration: self.vibration_topic.latest(),
            external_trigger: self.safety_topic.latest().map(|s| s.available && !s.off).unwrap_or(false)
                && self.status.is_armed(),
            armed: self.status.is_armed(),
            armed_at: self.status.armed_at,
        };
        self.detector.update(&self.params, &inputs, now);

        // a critical attitude failure right after leaving the ground
        // latches a lockdown for the rest of the session
        if self.status.is_armed() && self.have_taken_off {
            if let Some(takeoff_at) = self.status.takeoff_at {
                let window = Duration::from_secs_f32(self.params.fd_lockdown_window);
                if now.elapsed_since(takeoff_at) <= window && self.detector.flags().attitude_failure()
                {
                    self.early_takeoff_latched = true;
                }
            }
        }
    }

    fn poll_worker(&mut self, now: Timestamp) {
        if let Some(result) = self.worker.take_result() {
            self.flags.calibration_enabled = false;
            self.armed_out.in_esc_calibration_mode = false;
            let severity = if result.success {
                Severity::Info
            } else {
                Severity::Warning
            };
            if let Some(params) = result.loaded_params {
                if !self.status.is_armed() {
                    self.apply_params(params, now);
                }
            }
            self.emit_event("commander_worker_done", severity, result.message, now);
            if !result.success {
                self.negative_cue(now);
            }
        }
    }

    fn drain_power_button(&mut self, now: Timestamp) {
        while let Some(event) = self.power_button.pop() {
            match event {
                PowerButtonEvent::ShutdownRequest => {
                    if self.shutdown_if_allowed(now) {
                        self.emit_event(
                            "commander_shutdown",
                            Severity::Info,
                            "shutting down",
                            now,
                        );
                    } else {
                        self.emit_event(
                            "commander_shutdown_denied",
                            Severity::Warning,
                            "shutdown refused while armed",
                            now,
                        );
                        self.negative_cue(now);
                    }
                }
            }
        }
    }

    fn check_traffic(&mut self, now: Timestamp) {
        while let Some(report) = self.transponder_in.pop() {
            let Some(global) = self.global else {
                continue;
            };
            let horizontal =
                uas_core_shared::geo::distance_m(global.lat, global.lon, report.lat, report.lon);
            let vertical = (report.alt - global.alt).abs();
            let quiet = self
                .traffic_warned_at
                .map(|t| now.elapsed_since(t) < TRAFFIC_WARN_INTERVAL)
                .unwrap_or(false);
            if horizontal < TRAFFIC_WARN_DISTANCE_M
                && vertical < TRAFFIC_WARN_ALTITUDE_M
                && !quiet
            {
                self.traffic_warned_at = Some(now);
                self.emit_event(
                    "commander_traffic",
                    Severity::Warning,
                    format!(
                        "traffic {} at {horizontal:.0} m",
                        if report.callsign.is_empty() {
                            "unknown".to_string()
                        } else {
                            report.callsign.clone()
                        }
                    ),
                    now,
                );
            }
        }
    }

    // ---- edges and automatic reactions ----------------------------------

    fn handle_detector_edges(&mut self, now: Timestamp) {
        if self.detector.take_motor_failure_edge() {
            let action = self.params.motor_failure_action;
            self.emit_event(
                FailsafeCause::MotorFailure.event_id(),
                Severity::Critical,
                FailsafeCause::MotorFailure.describe(),
                now,
            );
            self.apply_internal_action(action);
        }
        if self.detector.take_imbalance_advisory() {
            let action = self.params.imbalanced_prop_action;
            self.emit_event(
                FailsafeCause::ImbalancedPropeller.event_id(),
                Severity::Warning,
                FailsafeCause::ImbalancedPropeller.describe(),
                now,
            );
            self.apply_internal_action(action);
        }
    }

    /// Single-shot reaction for detector edges: reached by switching the
    /// operator mode rather than by a persistent resolver input
    fn apply_internal_action(&mut self, action: FailsafeAction) {
        let target = match action {
            FailsafeAction::None | FailsafeAction::Warn => return,
            FailsafeAction::Hold => Some(MainState::AutoLoiter),
            FailsafeAction::ReturnToLaunch => Some(MainState::AutoRtl),
            FailsafeAction::Land | FailsafeAction::Descend => Some(MainState::AutoLand),
            FailsafeAction::Terminate => {
                if !self.params.cb_flight_termination {
                    self.armed_out.force_failsafe = true;
                }
                None
            }
            FailsafeAction::Lockdown => {
                self.armed_out.lockdown = true;
                None
            }
        };
        if let Some(target) = target {
            let ctx = self.mode_context();
            let _ = self.mode.try_set(target, &ctx);
        }
    }

    fn handle_flight_edges(&mut self, now: Timestamp) {
        let landed = self.land.landed;

        if self.status.is_armed() && self.was_landed && !landed {
            self.status.takeoff_at = Some(now);
            self.have_taken_off = true;
            self.emit_event("commander_takeoff", Severity::Info, "takeoff detected", now);
            if self.params.home_in_air_enabled {
                let global = self.global;
                let local = self.local;
                self.home.set_from_position(global.as_ref(), local.as_ref(), now);
            }
        }

        if self.status.is_armed() && !self.was_landed && landed {
            // the flight counter increments silently on every landing
            if let Some(log) = self.flight_log.as_mut() {
                if let Err(err) = log.record_landing() {
                    tracing::warn!(%err, "flight counter write failed");
                }
            }
        }

        self.was_landed = landed;

        // battery emergency on the ground: attempt a platform shutdown
        if self.battery_state.emergency
            && landed
            && !self.status.is_armed()
            && !self.shutdown_requested
        {
            if self.shutdown_if_allowed(now) {
                self.emit_event(
                    FailsafeCause::BatteryEmergency.event_id(),
                    Severity::Emergency,
                    "battery empty, shutting down",
                    now,
                );
            }
        }
    }

    fn handle_auto_disarm(&mut self, now: Timestamp) {
        let enabled = self.params.disarm_land_delay > 0.0;
        let landed_fire = self.auto_disarm.update_landed(
            self.status.is_armed() && self.land.landed && self.have_taken_off,
            enabled,
            now,
        );
        if landed_fire && self.status.is_armed() {
            self.disarm_forced("auto_disarm_land", "landed, disarming", now);
        }

        let kill_fire = self
            .auto_disarm
            .update_kill(self.armed_out.manual_lockdown, now);
        if kill_fire && self.status.is_armed() {
            self.disarm_forced("kill_switch", "kill switch held, disarming", now);
        }
    }

    fn handle_takeoff_handoff(&mut self, now: Timestamp) {
        // a finished takeoff parks the vehicle in a hold
        if matches!(
            self.status.nav_state,
            NavState::AutoTakeoff | NavState::AutoVtolTakeoff
        ) && self.mission_result.finished
            && self.mission_result.timestamp >= self.status.nav_state_changed_at
        {
            let ctx = self.mode_context();
            if self.mode.try_set(MainState::AutoLoiter, &ctx).accepted() {
                self.emit_event(
                    "commander_takeoff_complete",
                    Severity::Info,
                    "takeoff complete, holding",
                    now,
                );
            }
        }
    }

    fn resolve_failsafe(&mut self, now: Timestamp) {
        let low_remaining_time = self.params.battery_min_remaining_time > 0.0
            && self
                .flags
                .battery_low_remaining_time
                .map(|t| t < Duration::from_secs_f32(self.params.battery_min_remaining_time))
                .unwrap_or(false);

        let max_flight_time_exceeded = self.params.max_flight_time > 0.0
            && self.status.is_armed()
            && self
                .status
                .takeoff_at
                .map(|t| now.elapsed_since(t) > Duration::from_secs_f32(self.params.max_flight_time))
                .unwrap_or(false);

        let wind_max_exceeded = self.wind_max_exceeded;

        let inputs = FailsafeInputs {
            main_state: self.mode.state(),
            vehicle_type: self.config.vehicle_type,
            armed: self.status.is_armed(),
            landed: self.land.landed,
            force_failsafe: self.armed_out.force_failsafe,
            mission_termination: self.mission_result.flight_termination,
            early_takeoff_failure: self.early_takeoff_latched,
            battery_warning: self.battery_state.warning,
            battery_worsened: self.battery_state.worsened_after_delay,
            data_link_lost: self.link_state.data_link_lost,
            rc_lost: self.link_state.rc_lost,
            offboard_lost: self.flags.offboard_control_signal_lost,
            geofence_breached: self.geofence.breach_latched(),
            max_flight_time_exceeded,
            low_remaining_time,
            high_wind: wind_max_exceeded,
            quadchute: self.flags.vtol_transition_failure,
            home_valid: self.home.valid(),
            global_position_valid: self.flags.global_position_valid,
            local_position_valid: self.flags.local_position_valid,
        };

        let decision = failsafe::resolve(&self.params, &inputs);

        if decision.lockdown && !self.armed_out.lockdown {
            self.armed_out.lockdown = true;
            self.emit_event(
                "commander_lockdown",
                Severity::Emergency,
                "motors locked down",
                now,
            );
        }

        if decision.nav_state == NavState::Termination {
            // termination output is monotone for the rest of the flight
            self.armed_out.force_failsafe = true;
        }

        if decision.nav_state != self.status.nav_state {
            self.status.nav_state = decision.nav_state;
            self.status.nav_state_changed_at = now;
        }

        // decisions with the same cause coalesce into one announcement;
        // link and wind losses were already announced on their edges
        if decision.cause != self.last_cause {
            if let Some(cause) = decision.cause {
                let announced_elsewhere = matches!(
                    cause,
                    FailsafeCause::DataLinkLoss | FailsafeCause::RcLoss | FailsafeCause::HighWind
                );
                if !announced_elsewhere {
                    self.emit_event(cause.event_id(), Severity::Critical, cause.describe(), now);
                }
            }
            self.last_cause = decision.cause;
        }
        self.status.failsafe = decision.cause.is_some();
        self.status.failsafe_cause = decision.cause;
    }

    pub(crate) fn handle_arming_edges(&mut self, now: Timestamp) {
        let current = self.arm.state();
        if current == self.prev_arming_state {
            return;
        }

        if current == ArmingState::Armed {
            self.status.armed_at = Some(now);
            self.have_taken_off = false;
            self.auto_disarm.reset(now);
            // arming past the boot holdoff (re)establishes home
            let global = self.global;
            let local = self.local;
            if self.home.set_from_position(global.as_ref(), local.as_ref(), now) {
                self.emit_event("commander_home_set", Severity::Info, "home position set", now);
            }
            self.emit_event("commander_armed", Severity::Info, "armed", now);
            self.tunes_out.push(TuneControl {
                tune: TuneId::ArmingWarning,
                timestamp: now,
            });
        }

        if self.prev_arming_state == ArmingState::Armed && current != ArmingState::Armed {
            self.emit_event("commander_disarmed", Severity::Info, "disarmed", now);
            self.detector.reset_on_disarm(now);
            self.geofence.reset();
            self.early_takeoff_latched = false;
            self.armed_out.lockdown = false;
            self.have_taken_off = false;
            self.status.takeoff_at = None;
        }

        if current == ArmingState::Shutdown {
            self.home.invalidate();
        }

        self.prev_arming_state = current;
        self.armed_out.armed = current == ArmingState::Armed;
        self.status.arming_state = current;
    }

    // ---- helpers shared with the dispatchers ----------------------------

    pub(crate) fn arm_context<'a>(
        &self,
        report: &'a HealthReport,
        forced: bool,
        from_rc: bool,
    ) -> ArmContext<'a> {
        ArmContext {
            report,
            nav_state: self.status.nav_state,
            main_state: self.mode.state(),
            vehicle_type: self.config.vehicle_type,
            landed: self.land.landed,
            forced,
            from_rc,
            sticks: self.manual,
            geofence_action: self.params.geofence_action,
            home_valid: self.home.valid(),
            termination_latched: self.armed_out.force_failsafe,
            calibration_active: self.flags.calibration_enabled,
        }
    }

    pub(crate) fn mode_context(&self) -> ModeContext {
        ModeContext {
            flags: self.flags,
            offboard_available: self.offboard_ready.get_state(),
            mission_valid: self.mission_result.valid && self.mission_result.seq_total > 0,
            vehicle_type: self.config.vehicle_type,
        }
    }

    /// Attempt to arm; shared by commands and action requests
    pub(crate) fn try_arm(&mut self, forced: bool, from_rc: bool, now: Timestamp) -> TransitionResult {
        let report = self.health;
        let ctx = self.arm_context(&report, forced, from_rc);
        let result = self.arm.request(ArmingState::Armed, &ctx);
        if let TransitionResult::Denied(reason) = result {
            self.emit_event(
                "commander_arm_denied",
                Severity::Warning,
                format!("arming denied: {}", reason.as_str()),
                now,
            );
        } else {
            self.handle_arming_edges(now);
        }
        result
    }

    /// Attempt to disarm; shared by commands and action requests
    pub(crate) fn try_disarm(&mut self, forced: bool, now: Timestamp) -> TransitionResult {
        let report = self.health;
        let ctx = self.arm_context(&report, forced, false);
        let result = self.arm.request(ArmingState::Standby, &ctx);
        if let TransitionResult::Denied(reason) = result {
            self.emit_event(
                "commander_disarm_denied",
                Severity::Warning,
                format!("disarm denied: {}", reason.as_str()),
                now,
            );
        } else {
            self.handle_arming_edges(now);
        }
        result
    }

    fn disarm_forced(&mut self, reason_id: &'static str, message: &str, now: Timestamp) {
        let report = self.health;
        let ctx = self.arm_context(&report, true, false);
        if self.arm.request(ArmingState::Standby, &ctx) == TransitionResult::Changed {
            self.emit_event(reason_id, Severity::Info, message.to_string(), now);
            self.handle_arming_edges(now);
        }
    }

    /// Gate a reboot/shutdown request through the arm state machine
    pub(crate) fn shutdown_if_allowed(&mut self, now: Timestamp) -> bool {
        if !self.arm.shutdown_allowed() {
            return false;
        }
        let report = self.health;
        let ctx = self.arm_context(&report, false, false);
        if self
            .arm
            .request(ArmingState::Shutdown, &ctx)
            .accepted()
        {
            self.handle_arming_edges(now);
            self.shutdown_requested = true;
            true
        } else {
            false
        }
    }

    /// Rate-limited notification that a mode is not available
    pub(crate) fn notify_mode_unavailable(&mut self, target: MainState, now: Timestamp) {
        let quiet = self
            .mode_denied_at
            .map(|t| now.elapsed_since(t) < MODE_DENIED_NOTIFY_INTERVAL)
            .unwrap_or(false);
        if !quiet {
            self.mode_denied_at = Some(now);
            self.emit_event(
                "commander_mode_unavailable",
                Severity::Warning,
                format!("mode {target} not available"),
                now,
            );
        }
        self.negative_cue(now);
    }

    pub(crate) fn emit_event(
        &mut self,
        id: &'static str,
        severity: Severity,
        message: impl Into<String>,
        now: Timestamp,
    ) {
        let message = message.into();
        match severity {
            Severity::Info => tracing::info!(id, "{message}"),
            Severity::Warning => tracing::warn!(id, "{message}"),
            Severity::Critical | Severity::Emergency => tracing::error!(id, "{message}"),
        }
        self.events_out.push(Event::new(id, severity, message, now));
    }

    pub(crate) fn negative_cue(&mut self, now: Timestamp) {
        if !self.flags.rc_calibration_in_progress {
            self.tunes_out.push(TuneControl {
                tune: TuneId::NotifyNegative,
                timestamp: now,
            });
        }
    }

    pub(crate) fn publish_roi(&self, roi: VehicleRoi) {
        self.roi_topic.publish(roi);
    }

    // ---- output ---------------------------------------------------------

    fn update_led(&mut self, now: Timestamp) {
        let led = led_for(
            &LedInputs {
                arming_state: self.arm.state(),
                failsafe: self.status.failsafe,
                battery_warning: self.battery_state.warning,
                home_valid: self.home.valid(),
                cpu_load: self.cpu_load,
            },
            now,
        );
        if self.published_led != Some((led.color, led.mode)) {
            self.published_led = Some((led.color, led.mode));
            self.led_topic.publish(led);
        }
    }

    fn publish_outputs(&mut self, now: Timestamp) {
        let home = *self.home.home();
        if self.published_home.as_ref() != Some(&home) {
            self.published_home = Some(home);
            self.home_topic.publish(home);
        }

        let current = PublishedSet {
            status: self.status.clone(),
            flags: self.flags,
            armed: self.armed_out,
            control: self.control,
            commander_state: CommanderState {
                main_state: self.mode.state(),
                main_state_changes: self.mode.changes(),
            },
            failure: *self.detector.flags(),
        };

        let due = self
            .last_publish
            .map(|t| now.elapsed_since(t) >= PUBLISH_INTERVAL)
            .unwrap_or(true);
        let changed = self.published.as_ref() != Some(&current);

        if changed || due {
            // actuator_armed leaves first so every consumer of the later
            // records observes a consistent arm state
            self.armed_topic.publish(current.armed);
            self.control_topic.publish(current.control);
            self.status_topic.publish(current.status.clone());
            self.flags_topic.publish(current.flags);
            self.commander_state_topic.publish(current.commander_state);
            self.failure_topic.publish(current.failure);
            self.last_publish = Some(now);
            self.published = Some(current);
        }
    }
}

/// Drive a commander at its fixed period until shutdown
///
/// The tick itself stays synchronous; the task only owns the cadence and
/// the cooperative exit flag.
pub async fn run(
    mut commander: Commander,
    clock: uas_core_shared::time::BootClock,
    mut should_exit: tokio::sync::watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(std::time::Duration::from_micros(
        TICK_INTERVAL.as_micros(),
    ));
    loop {
        commander.tick(clock.now());
        if commander.should_exit() || *should_exit.borrow_and_update() {
            break;
        }
        // only sleep when the command queues are drained
        if !commander.has_pending_work() {
            interval.tick().await;
        } else {
            tokio::task::yield_now().await;
        }
    }
    tracing::info!("commander loop exited");
}
