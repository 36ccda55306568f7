//! Parameter snapshot
//!
//! The commander holds one [`Parameters`] snapshot and only replaces it
//! while disarmed, so a single flight always runs under one consistent
//! configuration. Parameters load from a JSON file with per-field
//! defaults; an empty file is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{FailsafeAction, GeofenceAction, OffboardRcAction, RtlType};

/// Complete configuration snapshot for the supervisory core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    // Link supervision
    /// Ground station link timeout in seconds
    pub datalink_loss_timeout: f32,
    /// High-latency backup link timeout in seconds
    pub highlatency_loss_timeout: f32,
    /// Manual control link timeout in seconds
    pub rc_loss_timeout: f32,
    /// Offboard stream timeout in seconds
    pub offboard_loss_timeout: f32,
    /// Continuous offboard stream required before the mode opens, seconds
    pub offboard_ready_delay: f32,
    /// Reaction to ground station link loss
    pub datalink_loss_action: FailsafeAction,
    /// Reaction to manual control link loss
    pub rc_loss_action: FailsafeAction,
    /// Ignore manual control loss while in an autonomous mode
    pub rc_loss_except_auto: bool,
    /// Ignore manual control loss while in offboard mode
    pub rc_loss_except_offboard: bool,
    /// Reaction to offboard loss with no manual link available
    pub offboard_loss_action: FailsafeAction,
    /// Reaction to offboard loss while the manual link still works
    pub offboard_loss_rc_action: OffboardRcAction,

    // Battery supervision
    /// Reaction when the battery warning level worsens while armed
    pub battery_action: FailsafeAction,
    /// Delay before the battery reaction engages, seconds
    pub battery_action_delay: f32,
    /// Return when the predicted remaining flight time falls below this
    /// many seconds, zero disables
    pub battery_min_remaining_time: f32,

    // Geofence
    /// Reaction to a geofence breach
    pub geofence_action: GeofenceAction,
    /// Maximum distance from home in metres, zero disables
    pub geofence_max_distance: f32,
    /// Maximum altitude above home in metres, zero disables
    pub geofence_max_altitude: f32,
    /// Horizontal braking deceleration used for breach prediction, m/s²
    pub horizontal_brake_decel: f32,
    /// Vertical braking deceleration used for breach prediction, m/s²
    pub vertical_brake_decel: f32,
    /// Fixed-wing horizontal prediction buffer in metres
    pub fw_fence_horizontal_buffer: f32,
    /// Fixed-wing vertical prediction buffer in metres
    pub fw_fence_vertical_buffer: f32,

    // Arming and disarming
    /// Disarm after being landed this long, seconds, zero disables
    pub disarm_land_delay: f32,
    /// Allow establishing home while flying
    pub home_in_air_enabled: bool,

    // Flight time supervision
    /// Maximum flight time in seconds, zero disables
    pub max_flight_time: f32,

    // Wind supervision
    /// Wind speed that triggers a warning, m/s, zero disables
    pub wind_warn_threshold: f32,
    /// Wind speed that forces a return, m/s, zero disables
    pub wind_max_threshold: f32,

    // Failure detector
    /// Maximum roll angle in degrees
    pub fd_max_roll_deg: f32,
    /// Maximum pitch angle in degrees
    pub fd_max_pitch_deg: f32,
    /// Attitude limit debounce in seconds
    pub fd_attitude_debounce: f32,
    /// Maximum unintended descent rate in m/s, zero disables
    pub fd_max_altitude_loss: f32,
    /// ESC arming response window in seconds
    pub fd_esc_timeout: f32,
    /// Lockdown window after takeoff for critical failures, seconds
    pub fd_lockdown_window: f32,
    /// Propeller imbalance metric limit, zero disables
    pub fd_imbalance_threshold: f32,
    /// Reaction to an imbalanced propeller
    pub imbalanced_prop_action: FailsafeAction,
    /// Reaction to a detected motor failure
    pub motor_failure_action: FailsafeAction,
    /// Reaction to a VTOL transition failure
    pub quadchute_action: FailsafeAction,

    // Circuit breakers
    /// Disable the flight-termination safety entirely (bench testing)
    pub cb_flight_termination: bool,

    // Navigator
    /// Default takeoff altitude above home in metres
    pub takeoff_altitude: f32,
    /// Return altitude above home in metres
    pub rtl_return_altitude: f32,
    /// Descend-to altitude above home before landing in metres
    pub rtl_descend_altitude: f32,
    /// Return flavour
    pub rtl_type: RtlType,
    /// Loiter time above home before landing, seconds, negative holds
    pub rtl_land_delay: f32,
    /// Default loiter radius in metres
    pub loiter_radius: f32,
    /// Default waypoint acceptance radius in metres
    pub acceptance_radius: f32,
    /// Altitude acceptance in metres
    pub altitude_acceptance: f32,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            datalink_loss_timeout: 10.0,
            highlatency_loss_timeout: 120.0,
            rc_loss_timeout: 0.5,
            offboard_loss_timeout: 1.0,
            offboard_ready_delay: 0.5,
            datalink_loss_action: FailsafeAction::ReturnToLaunch,
            rc_loss_action: FailsafeAction::ReturnToLaunch,
            rc_loss_except_auto: false,
            rc_loss_except_offboard: false,
            offboard_loss_action: FailsafeAction::Hold,
            offboard_loss_rc_action: OffboardRcAction::Position,
            battery_action: FailsafeAction::ReturnToLaunch,
            battery_action_delay: 5.0,
            battery_min_remaining_time: 0.0,
            geofence_action: GeofenceAction::Hold,
            geofence_max_distance: 0.0,
            geofence_max_altitude: 0.0,
            horizontal_brake_decel: 3.0,
            vertical_brake_decel: 1.5,
            fw_fence_horizontal_buffer: 150.0,
            fw_fence_vertical_buffer: 30.0,
            disarm_land_delay: 2.0,
            home_in_air_enabled: false,
            max_flight_time: 0.0,
            wind_warn_threshold: 0.0,
            wind_max_threshold: 0.0,
            fd_max_roll_deg: 60.0,
            fd_max_pitch_deg: 60.0,
            fd_attitude_debounce: 0.3,
            fd_max_altitude_loss: 0.0,
            fd_esc_timeout: 0.3,
            fd_lockdown_window: 3.0,
            fd_imbalance_threshold: 0.0,
            imbalanced_prop_action: FailsafeAction::Warn,
            motor_failure_action: FailsafeAction::Warn,
            quadchute_action: FailsafeAction::Land,
            cb_flight_termination: false,
            takeoff_altitude: 2.5,
            rtl_return_altitude: 60.0,
            rtl_descend_altitude: 30.0,
            rtl_type: RtlType::Direct,
            rtl_land_delay: 0.0,
            loiter_radius: 80.0,
            acceptance_radius: 10.0,
            altitude_acceptance: 0.8,
        }
    }
}

impl Parameters {
    /// Load a snapshot from a JSON file, filling missing fields with
    /// their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Save the snapshot to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_object_yields_defaults() {
        let params: Parameters = serde_json::from_str("{}").expect("parse");
        assert_eq!(params, Parameters::default());
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, r#"{{"disarm_land_delay": 4.5, "rtl_type": "Closest"}}"#).expect("write");
        let params = Parameters::load(file.path()).expect("load");
        assert_eq!(params.disarm_land_delay, 4.5);
        assert_eq!(params.rtl_type, RtlType::Closest);
        assert_eq!(
            params.datalink_loss_timeout,
            Parameters::default().datalink_loss_timeout
        );
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("params.json");
        let mut params = Parameters::default();
        params.max_flight_time = 1800.0;
        params.save(&path).expect("save");
        let loaded = Parameters::load(&path).expect("load");
        assert_eq!(loaded, params);
    }
}
