//! Vehicle command dispatcher
//!
//! Commands addressed to another system or component are ignored without
//! an acknowledgement; every command the core handles receives exactly
//! one ACK. Handlers return the result, the dispatcher does the
//! acknowledgement and the negative cue.

use uas_core_shared::command::{
    main_state_of, AckResult, CommandAck, CommandId, VehicleCommand, ARM_DISARM_FORCE_MAGIC,
    IN_AIR_RESTORE_MAGIC,
};
use uas_core_shared::events::Severity;
use uas_core_shared::setpoint::VehicleRoi;
use uas_core_shared::time::Timestamp;
use uas_core_shared::types::{ArmingState, DenialReason, MainState, TransitionResult};

use crate::commander::Commander;
use crate::worker::{CalibrationKind, WorkerTask};

impl Commander {
    /// Filter, route, and acknowledge one pending command
    pub(crate) fn process_command(&mut self, cmd: VehicleCommand, now: Timestamp) {
        if !cmd.targets(self.config.system_id, self.config.component_id) {
            // addressed elsewhere: explicitly ignored, no ACK
            return;
        }

        let result = self.dispatch(&cmd, now);
        self.acks_out.push(CommandAck {
            command: cmd.command,
            result,
            target_system: cmd.source_system,
            target_component: cmd.source_component,
            from_external: cmd.from_external,
            timestamp: now,
        });
        if result.is_negative() {
            self.negative_cue(now);
        }
    }

    fn dispatch(&mut self, cmd: &VehicleCommand, now: Timestamp) -> AckResult {
        match cmd.command {
            CommandId::SetMode => self.cmd_set_mode(cmd, now),
            CommandId::ComponentArmDisarm => self.cmd_arm_disarm(cmd, now),
            CommandId::Reposition => self.cmd_reposition(cmd, now),
            CommandId::FlightTermination => self.cmd_flight_termination(cmd, now),
            CommandId::SetHome => self.cmd_set_home(cmd, now),
            CommandId::ReturnToLaunch => self.cmd_nav_mode(MainState::AutoRtl, cmd, now),
            CommandId::Takeoff => self.cmd_nav_mode(MainState::AutoTakeoff, cmd, now),
            CommandId::VtolTakeoff => self.cmd_nav_mode(MainState::AutoVtolTakeoff, cmd, now),
            CommandId::Land => self.cmd_nav_mode(MainState::AutoLand, cmd, now),
            CommandId::PrecisionLand => self.cmd_nav_mode(MainState::AutoPrecland, cmd, now),
            CommandId::MissionStart => self.cmd_mission_start(cmd, now),
            CommandId::ControlHighLatency => {
                self.link.set_high_latency_enabled(cmd.param1 > 0.5);
                AckResult::Accepted
            }
            CommandId::Orbit => self.cmd_orbit(cmd, now),
            CommandId::ActuatorTest => {
                if self.status.is_armed() {
                    AckResult::Denied
                } else {
                    // actuator drivers are external in this configuration
                    AckResult::Unsupported
                }
            }
            CommandId::RebootShutdown => self.cmd_reboot_shutdown(cmd, now),
            CommandId::Calibration => self.cmd_calibration(cmd, now),
            CommandId::FixedMagCalYaw => self.cmd_fixed_mag_cal_yaw(cmd, now),
            CommandId::StorageAccess => self.cmd_storage_access(cmd, now),
            CommandId::RunPrearmChecks => {
                // checks re-run every tick; acknowledge the explicit request
                self.emit_event(
                    "commander_prearm_checks",
                    Severity::Info,
                    if self.health.prearm_ok {
                        "prearm checks pass"
                    } else {
                        "prearm checks fail"
                    },
                    now,
                );
                AckResult::Accepted
            }
            CommandId::StartRxPair => {
                self.emit_event(
                    "commander_rx_pair",
                    Severity::Info,
                    "receiver pairing started",
                    now,
                );
                AckResult::Accepted
            }
            CommandId::SetGpsGlobalOrigin => {
                if cmd.param6.is_finite() && cmd.param7.is_finite() {
                    self.gps_origin = Some((cmd.param6, cmd.param7, cmd.param3));
                    self.emit_event(
                        "commander_origin_set",
                        Severity::Info,
                        "local frame origin set",
                        now,
                    );
                    AckResult::Accepted
                } else {
                    AckResult::Denied
                }
            }
            // outbound only; never handled here
            CommandId::ParachuteRelease => AckResult::Unsupported,
        }
    }

    fn cmd_set_mode(&mut self, cmd: &VehicleCommand, now: Timestamp) -> AckResult {
        let Some(target) = main_state_of(cmd.param2 as u32, cmd.param3 as u32) else {
            return AckResult::Denied;
        };

        // a high-level source may install the first mode without checks
        if cmd.from_external && !self.mode.operator_changed() && target == MainState::Posctl {
            self.mode.force_install(target);
            return AckResult::Accepted;
        }

        self.set_mode_with_feedback(target, now)
    }

    /// Shared mode-change path with the rate-limited denial notification
    pub(crate) fn set_mode_with_feedback(&mut self, target: MainState, now: Timestamp) -> AckResult {
        let ctx = self.mode_context();
        match self.mode.try_set(target, &ctx) {
            TransitionResult::Changed | TransitionResult::NotChanged => AckResult::Accepted,
            TransitionResult::Denied(reason) => {
                self.notify_mode_unavailable(target, now);
                match reason {
                    DenialReason::EstimateMissing | DenialReason::OffboardSignalMissing => {
                        AckResult::TemporarilyRejected
                    }
                    _ => AckResult::Denied,
                }
            }
        }
    }

    fn cmd_arm_disarm(&mut self, cmd: &VehicleCommand, now: Timestamp) -> AckResult {
        let arm = cmd.param1 >= 0.5;
        let forced = cmd.param2 == ARM_DISARM_FORCE_MAGIC;
        let in_air_restore = cmd.param3 == IN_AIR_RESTORE_MAGIC
            && cmd.source_system == self.config.system_id
            && !cmd.from_external;

        let result = if arm {
            if in_air_restore && self.arm.state() == ArmingState::Init {
                let report = self.health;
                let ctx = self.arm_context(&report, forced, false);
                let _ = self.arm.request(ArmingState::InAirRestore, &ctx);
                let result = self.arm.request(ArmingState::Armed, &ctx);
                if result.accepted() {
                    self.handle_arming_edges(now);
                    self.emit_event(
                        "commander_in_air_restore",
                        Severity::Warning,
                        "restored arming in flight",
                        now,
                    );
                }
                result
            } else {
                self.try_arm(forced, false, now)
            }
        } else {
            self.try_disarm(forced, now)
        };

        match result {
            TransitionResult::Changed | TransitionResult::NotChanged => AckResult::Accepted,
            TransitionResult::Denied(_) => AckResult::Denied,
        }
    }

    fn cmd_reposition(&mut self, cmd: &VehicleCommand, now: Timestamp) -> AckResult {
        if !self.flags.global_position_valid {
            return AckResult::TemporarilyRejected;
        }
        let switch_to_loiter = (cmd.param2 as u32) & 1 != 0;
        if switch_to_loiter {
            let result = self.set_mode_with_feedback(MainState::AutoLoiter, now);
            if result != AckResult::Accepted {
                return result;
            }
        }
        self.navigator_out.push(cmd.clone());
        AckResult::Accepted
    }

    fn cmd_flight_termination(&mut self, cmd: &VehicleCommand, now: Timestamp) -> AckResult {
        if cmd.param1 > 1.5 {
            self.armed_out.lockdown = true;
            self.emit_event(
                "commander_lockdown",
                Severity::Emergency,
                "lockdown engaged by command",
                now,
            );
        } else if cmd.param1 > 0.5 {
            if self.params.cb_flight_termination {
                return AckResult::Denied;
            }
            self.armed_out.force_failsafe = true;
            self.emit_event(
                "failsafe_flight_termination",
                Severity::Emergency,
                "flight termination engaged by command",
                now,
            );
        } else {
            self.armed_out.lockdown = false;
            self.armed_out.force_failsafe = false;
            self.emit_event(
                "commander_lockdown_cleared",
                Severity::Info,
                "lockdown cleared",
                now,
            );
        }
        AckResult::Accepted
    }

    fn cmd_set_home(&mut self, cmd: &VehicleCommand, now: Timestamp) -> AckResult {
        let changed = if cmd.param1 >= 0.5 {
            if !self.flags.global_position_valid {
                return AckResult::TemporarilyRejected;
            }
            let global = self.global;
            let local = self.local;
            self.home.set_from_position(global.as_ref(), local.as_ref(), now)
        } else {
            self.home
                .set_manual(cmd.param6, cmd.param7, cmd.param3, cmd.param4, now)
        };
        if changed {
            self.emit_event("commander_home_set", Severity::Info, "home position set", now);
            AckResult::Accepted
        } else {
            AckResult::Denied
        }
    }

    fn cmd_nav_mode(&mut self, target: MainState, cmd: &VehicleCommand, now: Timestamp) -> AckResult {
        let result = self.set_mode_with_feedback(target, now);
        if result == AckResult::Accepted {
            self.navigator_out.push(cmd.clone());
        }
        result
    }

    fn cmd_mission_start(&mut self, cmd: &VehicleCommand, now: Timestamp) -> AckResult {
        let first_item = cmd.param1.max(0.0) as u32;
        if !self.mission_result.valid || first_item >= self.mission_result.seq_total {
            return AckResult::Denied;
        }
        let result = self.set_mode_with_feedback(MainState::AutoMission, now);
        if result == AckResult::Accepted {
            self.navigator_out.push(cmd.clone());
        }
        result
    }

    fn cmd_orbit(&mut self, cmd: &VehicleCommand, now: Timestamp) -> AckResult {
        let result = self.set_mode_with_feedback(MainState::Orbit, now);
        if result == AckResult::Accepted {
            self.publish_roi(VehicleRoi {
                valid: true,
                lat: cmd.param6,
                lon: cmd.param7,
                alt: cmd.param3,
                timestamp: now,
            });
            self.navigator_out.push(cmd.clone());
        }
        result
    }

    fn cmd_reboot_shutdown(&mut self, cmd: &VehicleCommand, now: Timestamp) -> AckResult {
        let kind = cmd.param1 as u32;
        if kind == 0 {
            return AckResult::Accepted;
        }
        if kind > 3 {
            return AckResult::Unsupported;
        }
        if self.shutdown_if_allowed(now) {
            self.emit_event(
                "commander_shutdown",
                Severity::Info,
                match kind {
                    1 => "rebooting",
                    2 => "shutting down",
                    _ => "rebooting to bootloader",
                },
                now,
            );
            AckResult::Accepted
        } else {
            AckResult::Denied
        }
    }

    fn cmd_calibration(&mut self, cmd: &VehicleCommand, now: Timestamp) -> AckResult {
        let kind = if cmd.param1 >= 1.0 {
            Some(CalibrationKind::Gyro)
        } else if cmd.param2 >= 2.0 {
            Some(CalibrationKind::MagQuick)
        } else if cmd.param2 >= 1.0 {
            Some(CalibrationKind::Mag)
        } else if cmd.param3 >= 1.0 {
            Some(CalibrationKind::Baro)
        } else if cmd.param5 >= 4.0 {
            Some(CalibrationKind::AccelQuick)
        } else if cmd.param5 >= 2.0 {
            Some(CalibrationKind::Level)
        } else if cmd.param5 >= 1.0 {
            Some(CalibrationKind::Accel)
        } else if cmd.param6 >= 1.0 {
            Some(CalibrationKind::Airspeed)
        } else if cmd.param7 >= 1.0 {
            Some(CalibrationKind::Esc)
        } else {
            None
        };
        let Some(kind) = kind else {
            return AckResult::Unsupported;
        };
        self.start_calibration(WorkerTask::Calibration(kind), kind == CalibrationKind::Esc, now)
    }

    fn cmd_fixed_mag_cal_yaw(&mut self, cmd: &VehicleCommand, now: Timestamp) -> AckResult {
        self.start_calibration(
            WorkerTask::MagCalWithYaw(cmd.param1.to_radians()),
            false,
            now,
        )
    }

    /// Common gates for every calibration request
    pub(crate) fn start_calibration(
        &mut self,
        task: WorkerTask,
        esc_passthrough: bool,
        now: Timestamp,
    ) -> AckResult {
        if self.status.is_armed() {
            return AckResult::Denied;
        }
        if self.worker.busy() {
            return AckResult::TemporarilyRejected;
        }
        match self.worker.start(task) {
            Ok(()) => {
                self.flags.calibration_enabled = true;
                self.armed_out.in_esc_calibration_mode = esc_passthrough;
                self.emit_event(
                    "commander_calibration",
                    Severity::Info,
                    "calibration started",
                    now,
                );
                AckResult::Accepted
            }
            Err(err) => err.ack_result(),
        }
    }

    fn cmd_storage_access(&mut self, cmd: &VehicleCommand, now: Timestamp) -> AckResult {
        if self.status.is_armed() {
            return AckResult::Denied;
        }
        let Some(path) = self.config.param_file.clone() else {
            return AckResult::Unsupported;
        };
        if self.worker.busy() {
            return AckResult::TemporarilyRejected;
        }
        let action = cmd.param1 as i32;
        let task = match action {
            0 => WorkerTask::LoadParams(path),
            1 => WorkerTask::SaveParams(path, self.params.clone()),
            2 => {
                self.apply_params(uas_core_shared::params::Parameters::default(), now);
                return AckResult::Accepted;
            }
            _ => return AckResult::Unsupported,
        };
        match self.worker.start(task) {
            Ok(()) => AckResult::Accepted,
            Err(err) => err.ack_result(),
        }
    }
}
