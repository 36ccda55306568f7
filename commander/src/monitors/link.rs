//! Link supervision
//!
//! Tracks the last heartbeat per link role and the freshness of the
//! manual control stream. Loss and regain edges are reported once so the
//! commander can emit a single event per transition. The USB flag is
//! sticky within a session.

use std::collections::HashMap;

use uas_core_shared::params::Parameters;
use uas_core_shared::sensors::{LinkRole, ManualControl, SystemPower};
use uas_core_shared::time::{Duration, Timestamp};

/// Link verdicts for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkState {
    /// Manual control link lost
    pub rc_lost: bool,
    /// Ground station link lost
    pub data_link_lost: bool,
    /// High-latency backup link lost
    pub high_latency_lost: bool,
    /// Ground station link transitioned to lost this tick
    pub gcs_lost_edge: bool,
    /// Ground station link transitioned back this tick
    pub gcs_regained_edge: bool,
    /// Manual control link transitioned to lost this tick
    pub rc_lost_edge: bool,
    /// A USB host is attached (sticky)
    pub usb_connected: bool,
}

/// The link monitor
#[derive(Debug)]
pub struct LinkMonitor {
    last_heartbeat: HashMap<LinkRole, Timestamp>,
    last_manual_control: Option<Timestamp>,
    high_latency_enabled: bool,
    usb_connected: bool,
    state: LinkState,
    ever_had_gcs: bool,
}

impl LinkMonitor {
    /// A monitor that has seen nothing yet
    pub fn new() -> Self {
        Self {
            last_heartbeat: HashMap::new(),
            last_manual_control: None,
            high_latency_enabled: false,
            usb_connected: false,
            state: LinkState {
                rc_lost: true,
                data_link_lost: true,
                ..Default::default()
            },
            ever_had_gcs: false,
        }
    }

    /// Record a heartbeat from one link endpoint
    pub fn note_heartbeat(&mut self, role: LinkRole, timestamp: Timestamp) {
        let entry = self.last_heartbeat.entry(role).or_insert(timestamp);
        if timestamp > *entry {
            *entry = timestamp;
        }
        if role == LinkRole::Gcs {
            self.ever_had_gcs = true;
        }
    }

    /// Enable or disable the high-latency backup link
    pub fn set_high_latency_enabled(&mut self, enabled: bool) {
        self.high_latency_enabled = enabled;
    }

    /// Whether the high-latency link is enabled
    pub const fn high_latency_enabled(&self) -> bool {
        self.high_latency_enabled
    }

    /// Last heartbeat seen for a role
    pub fn last_seen(&self, role: LinkRole) -> Option<Timestamp> {
        self.last_heartbeat.get(&role).copied()
    }

    /// Evaluate all link timeouts
    pub fn update(
        &mut self,
        params: &Parameters,
        manual_control: Option<&ManualControl>,
        system_power: Option<&SystemPower>,
        now: Timestamp,
    ) -> LinkState {
        if let Some(manual) = manual_control {
            if self
                .last_manual_control
                .map(|t| manual.timestamp > t)
                .unwrap_or(true)
            {
                self.last_manual_control = Some(manual.timestamp);
            }
        }
        if let Some(power) = system_power {
            // sticky: a disconnect mid-session does not clear the flag
            self.usb_connected |= power.usb_connected;
        }

        let rc_timeout = Duration::from_secs_f32(params.rc_loss_timeout);
        let rc_lost = self
            .last_manual_control
            .map(|t| now.elapsed_since(t) > rc_timeout)
            .unwrap_or(true);

        let dl_timeout = Duration::from_secs_f32(params.datalink_loss_timeout);
        let data_link_lost = self
            .last_heartbeat
            .get(&LinkRole::Gcs)
            .map(|t| now.elapsed_since(*t) > dl_timeout)
            .unwrap_or(true);

        let hl_timeout = Duration::from_secs_f32(params.highlatency_loss_timeout);
        let high_latency_lost = self.high_latency_enabled
            && self
                .last_heartbeat
                .get(&LinkRole::HighLatency)
                .map(|t| now.elapsed_since(*t) > hl_timeout)
                .unwrap_or(true);

        let previous = self.state;
        self.state = LinkState {
            rc_lost,
            data_link_lost,
            high_latency_lost,
            // loss edges only fire once a link existed at all
            gcs_lost_edge: self.ever_had_gcs && data_link_lost && !previous.data_link_lost,
            gcs_regained_edge: !data_link_lost && previous.data_link_lost && self.ever_had_gcs,
            rc_lost_edge: rc_lost && !previous.rc_lost,
            usb_connected: self.usb_connected,
        };
        self.state
    }
}

impl Default for LinkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[test]
    fn gcs_loss_and_regain_edges_fire_once() {
        let params = Parameters::default();
        let mut monitor = LinkMonitor::new();

        monitor.note_heartbeat(LinkRole::Gcs, t(0));
        let state = monitor.update(&params, None, None, t(100));
        assert!(!state.data_link_lost);
        assert!(state.gcs_regained_edge);

        // timeout is 10 s
        let state = monitor.update(&params, None, None, t(11_000));
        assert!(state.data_link_lost);
        assert!(state.gcs_lost_edge);
        let state = monitor.update(&params, None, None, t(12_000));
        assert!(state.data_link_lost);
        assert!(!state.gcs_lost_edge);

        monitor.note_heartbeat(LinkRole::Gcs, t(12_500));
        let state = monitor.update(&params, None, None, t(12_600));
        assert!(state.gcs_regained_edge);
    }

    #[test]
    fn rc_loss_follows_manual_control_freshness() {
        let params = Parameters::default();
        let mut monitor = LinkMonitor::new();

        let manual = ManualControl {
            timestamp: t(1_000),
            ..Default::default()
        };
        let state = monitor.update(&params, Some(&manual), None, t(1_100));
        assert!(!state.rc_lost);

        // timeout is 0.5 s
        let state = monitor.update(&params, Some(&manual), None, t(1_700));
        assert!(state.rc_lost);
        assert!(state.rc_lost_edge);
    }

    #[test]
    fn never_heard_gcs_is_lost_without_an_edge() {
        let params = Parameters::default();
        let mut monitor = LinkMonitor::new();
        let state = monitor.update(&params, None, None, t(20_000));
        assert!(state.data_link_lost);
        assert!(!state.gcs_lost_edge);
    }

    #[test]
    fn usb_flag_is_sticky() {
        let params = Parameters::default();
        let mut monitor = LinkMonitor::new();

        let plugged = SystemPower {
            usb_connected: true,
            brick_valid: true,
            timestamp: t(0),
        };
        let state = monitor.update(&params, None, Some(&plugged), t(100));
        assert!(state.usb_connected);

        let unplugged = SystemPower {
            usb_connected: false,
            brick_valid: true,
            timestamp: t(200),
        };
        let state = monitor.update(&params, None, Some(&unplugged), t(300));
        assert!(state.usb_connected);
    }

    #[test]
    fn high_latency_only_counts_when_enabled() {
        let params = Parameters::default();
        let mut monitor = LinkMonitor::new();
        let state = monitor.update(&params, None, None, t(500_000));
        assert!(!state.high_latency_lost);

        monitor.set_high_latency_enabled(true);
        let state = monitor.update(&params, None, None, t(500_100));
        assert!(state.high_latency_lost);
    }
}
