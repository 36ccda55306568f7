//! Operator action requests
//!
//! The compact intents surfaced by the manual control link: arm and
//! disarm gestures, the kill switch, and mode selection. Unlike
//! commands, action requests carry no addressing and receive no ACK;
//! feedback is the tune and the event stream.

use uas_core_shared::command::{
    ActionRequest, ActionSource, RequestedAction, VehicleCommand,
};
use uas_core_shared::events::{Severity, TuneControl, TuneId};
use uas_core_shared::time::Timestamp;
use uas_core_shared::types::{MainState, TransitionResult};

use crate::commander::Commander;

impl Commander {
    /// Handle one pending action request
    pub(crate) fn process_action(&mut self, request: ActionRequest, now: Timestamp) {
        match request.action {
            RequestedAction::Arm => {
                let result = self.try_arm(false, true, now);
                if !result.accepted() {
                    self.negative_cue(now);
                }
            }
            RequestedAction::Disarm => {
                let result = self.try_disarm(false, now);
                if !result.accepted() {
                    self.negative_cue(now);
                }
            }
            RequestedAction::ToggleArm => {
                let result = if self.status.is_armed() {
                    self.try_disarm(false, now)
                } else {
                    self.try_arm(false, true, now)
                };
                if !result.accepted() {
                    self.negative_cue(now);
                }
            }
            RequestedAction::Kill => self.engage_kill_switch(now),
            RequestedAction::Unkill => {
                if self.armed_out.manual_lockdown {
                    self.armed_out.manual_lockdown = false;
                    self.emit_event(
                        "commander_kill_released",
                        Severity::Warning,
                        "kill switch released",
                        now,
                    );
                }
            }
            RequestedAction::SwitchMode => {
                let Some(target) = request.mode else {
                    return;
                };
                self.switch_mode_from(request.source, target, now);
            }
        }
    }

    fn engage_kill_switch(&mut self, now: Timestamp) {
        if self.armed_out.manual_lockdown {
            return;
        }
        self.armed_out.manual_lockdown = true;
        self.emit_event(
            "commander_kill_engaged",
            Severity::Emergency,
            "kill switch engaged, motors off",
            now,
        );
        // announce and trigger the parachute lane
        self.tunes_out.push(TuneControl {
            tune: TuneId::ParachuteRelease,
            timestamp: now,
        });
        self.command_out.push(VehicleCommand::parachute_release(
            self.config.system_id,
            self.config.parachute_component_id,
        ));
    }

    fn switch_mode_from(&mut self, source: ActionSource, target: MainState, now: Timestamp) {
        // the initial mode-slot assignment installs the starting mode
        // without transition checks
        if source == ActionSource::RcModeSlot
            && !self.mode.operator_changed()
            && matches!(target, MainState::Altctl | MainState::Posctl)
        {
            self.mode.force_install(target);
            return;
        }

        let ctx = self.mode_context();
        if let TransitionResult::Denied(_) = self.mode.try_set(target, &ctx) {
            self.notify_mode_unavailable(target, now);
        }
    }
}
