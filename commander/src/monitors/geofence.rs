//! Geofence supervision
//!
//! At a fixed interval the monitor builds a predicted test point from
//! the braking distance of the vehicle and asks the fence geometry about
//! distance-to-home, maximum altitude, and containment. A breach latches
//! until disarm so the resulting failsafe action does not cancel itself
//! the moment the vehicle re-enters the fence.

use uas_core_shared::geo::{self, FenceFile};
use uas_core_shared::params::Parameters;
use uas_core_shared::sensors::{GlobalPosition, LocalPosition};
use uas_core_shared::status::{GeofenceResult, HomePosition};
use uas_core_shared::time::{Duration, Timestamp};
use uas_core_shared::types::VehicleType;

/// Evaluation interval
const CHECK_INTERVAL: Duration = Duration::from_millis(200);

/// The geofence monitor
#[derive(Debug, Default)]
pub struct GeofenceMonitor {
    fence: FenceFile,
    last_check: Option<Timestamp>,
    result: GeofenceResult,
    latched: bool,
}

impl GeofenceMonitor {
    /// A monitor with no fence loaded
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the fence geometry
    pub fn set_fence(&mut self, fence: FenceFile) {
        self.fence = fence;
    }

    /// The most recent verdict
    pub const fn result(&self) -> &GeofenceResult {
        &self.result
    }

    /// Whether a breach is latched
    pub const fn breach_latched(&self) -> bool {
        self.latched
    }

    /// Clear the latch on disarm
    pub fn reset(&mut self) {
        self.latched = false;
        self.result.breached = false;
        self.result.predicted = false;
    }

    /// Evaluate the fence at the configured cadence
    ///
    /// Returns a fresh verdict when a check ran this tick.
    pub fn update(
        &mut self,
        params: &Parameters,
        home: &HomePosition,
        global: Option<&GlobalPosition>,
        local: Option<&LocalPosition>,
        vehicle_type: VehicleType,
        now: Timestamp,
    ) -> Option<GeofenceResult> {
        if let Some(last) = self.last_check {
            if now.elapsed_since(last) < CHECK_INTERVAL {
                return None;
            }
        }
        self.last_check = Some(now);

        let Some(global) = global else {
            return None;
        };

        // Predicted test point: where the vehicle would stop if it braked now
        let (test_lat, test_lon, test_alt) = match vehicle_type {
            VehicleType::FixedWing => {
                // fixed turn/climb margins instead of a braking model
                let heading = local.map(|l| f64::from(l.heading)).unwrap_or(0.0);
                let (lat, lon) = geo::project(
                    global.lat,
                    global.lon,
                    heading,
                    f64::from(params.fw_fence_horizontal_buffer),
                );
                (lat, lon, global.alt + params.fw_fence_vertical_buffer)
            }
            _ => match local {
                Some(local) if local.v_xy_valid => {
                    let speed = f64::from(local.ground_speed());
                    let brake = if params.horizontal_brake_decel > 0.0 {
                        speed * speed / (2.0 * f64::from(params.horizontal_brake_decel))
                    } else {
                        0.0
                    };
                    let bearing = f64::from(local.vy).atan2(f64::from(local.vx));
                    let (lat, lon) = geo::project(global.lat, global.lon, bearing, brake);

                    let climb = -local.vz; // up positive
                    let vertical_brake = if params.vertical_brake_decel > 0.0 {
                        climb * climb.abs() / (2.0 * params.vertical_brake_decel)
                    } else {
                        0.0
                    };
                    (lat, lon, global.alt + vertical_brake)
                }
                _ => (global.lat, global.lon, global.alt),
            },
        };

        let violation_at = |lat: f64, lon: f64, alt: f32| {
            let mut distance_exceeded = false;
            let mut altitude_exceeded = false;
            if home.usable() {
                if params.geofence_max_distance > 0.0 {
                    let d = geo::distance_m(home.lat, home.lon, lat, lon);
                    distance_exceeded = d > f64::from(params.geofence_max_distance);
                }
                if params.geofence_max_altitude > 0.0 {
                    altitude_exceeded = alt - home.alt > params.geofence_max_altitude;
                }
            }
            let outside = !self.fence.contains(lat, lon);
            (distance_exceeded, altitude_exceeded, outside)
        };

        let (now_dist, now_alt, now_outside) = violation_at(global.lat, global.lon, global.alt);
        let (pred_dist, pred_alt, pred_outside) = violation_at(test_lat, test_lon, test_alt);

        let breached_now = now_dist || now_alt || now_outside;
        let predicted = pred_dist || pred_alt || pred_outside;

        if breached_now || predicted {
            self.latched = true;
        }

        self.result = GeofenceResult {
            breached: self.latched,
            predicted,
            max_distance_exceeded: now_dist || pred_dist,
            max_altitude_exceeded: now_alt || pred_alt,
            action: params.geofence_action,
            timestamp: now,
        };
        Some(self.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uas_core_shared::geo::{FenceCircle, FenceShape};

    fn home() -> HomePosition {
        HomePosition {
            lat: 47.0,
            lon: 8.0,
            alt: 400.0,
            yaw: 0.0,
            timestamp: Timestamp::ZERO,
            valid: true,
        }
    }

    fn global_at(lat: f64, lon: f64, alt: f32) -> GlobalPosition {
        GlobalPosition {
            lat,
            lon,
            alt,
            timestamp: Timestamp::ZERO,
        }
    }

    fn moving_towards(bearing: f64, speed: f32) -> LocalPosition {
        LocalPosition {
            v_xy_valid: true,
            vx: speed * bearing.cos() as f32,
            vy: speed * bearing.sin() as f32,
            ..Default::default()
        }
    }

    #[test]
    fn predicted_breach_uses_braking_distance() {
        let mut params = Parameters::default();
        params.geofence_max_distance = 200.0;
        params.horizontal_brake_decel = 3.0;

        let mut monitor = GeofenceMonitor::new();
        // 198 m from home, flying away at 5 m/s: braking needs ~4.2 m,
        // so the stopping point crosses the 200 m limit
        let (lat, lon) = geo::project(47.0, 8.0, 0.0, 198.0);
        let result = monitor
            .update(
                &params,
                &home(),
                Some(&global_at(lat, lon, 420.0)),
                Some(&moving_towards(0.0, 5.0)),
                VehicleType::RotaryWing,
                Timestamp::from_secs(1),
            )
            .expect("check ran");
        assert!(result.predicted);
        assert!(result.breached);
    }

    #[test]
    fn slow_vehicle_inside_the_limit_is_clean() {
        let mut params = Parameters::default();
        params.geofence_max_distance = 200.0;

        let mut monitor = GeofenceMonitor::new();
        let (lat, lon) = geo::project(47.0, 8.0, 0.0, 100.0);
        let result = monitor
            .update(
                &params,
                &home(),
                Some(&global_at(lat, lon, 420.0)),
                Some(&moving_towards(0.0, 1.0)),
                VehicleType::RotaryWing,
                Timestamp::from_secs(1),
            )
            .expect("check ran");
        assert!(!result.breached);
        assert!(!result.predicted);
    }

    #[test]
    fn breach_latches_until_reset() {
        let mut params = Parameters::default();
        params.geofence_max_distance = 100.0;

        let mut monitor = GeofenceMonitor::new();
        let (lat, lon) = geo::project(47.0, 8.0, 0.0, 150.0);
        let result = monitor
            .update(
                &params,
                &home(),
                Some(&global_at(lat, lon, 410.0)),
                None,
                VehicleType::RotaryWing,
                Timestamp::from_secs(1),
            )
            .expect("check ran");
        assert!(result.breached);

        // back inside, still latched
        let result = monitor
            .update(
                &params,
                &home(),
                Some(&global_at(47.0, 8.0, 410.0)),
                None,
                VehicleType::RotaryWing,
                Timestamp::from_secs(2),
            )
            .expect("check ran");
        assert!(result.breached);

        monitor.reset();
        let result = monitor
            .update(
                &params,
                &home(),
                Some(&global_at(47.0, 8.0, 410.0)),
                None,
                VehicleType::RotaryWing,
                Timestamp::from_secs(3),
            )
            .expect("check ran");
        assert!(!result.breached);
    }

    #[test]
    fn altitude_limit_counts_above_home() {
        let mut params = Parameters::default();
        params.geofence_max_altitude = 50.0;

        let mut monitor = GeofenceMonitor::new();
        let result = monitor
            .update(
                &params,
                &home(),
                Some(&global_at(47.0, 8.0, 460.0)),
                None,
                VehicleType::RotaryWing,
                Timestamp::from_secs(1),
            )
            .expect("check ran");
        assert!(result.max_altitude_exceeded);
        assert!(result.breached);
    }

    #[test]
    fn polygonless_circle_fence_is_checked() {
        let params = Parameters::default();
        let mut monitor = GeofenceMonitor::new();
        monitor.set_fence(FenceFile {
            inclusion: vec![FenceShape::Circle(FenceCircle {
                lat: 47.0,
                lon: 8.0,
                radius_m: 100.0,
            })],
        });

        let (lat, lon) = geo::project(47.0, 8.0, 1.0, 150.0);
        let result = monitor
            .update(
                &params,
                &home(),
                Some(&global_at(lat, lon, 410.0)),
                None,
                VehicleType::RotaryWing,
                Timestamp::from_secs(1),
            )
            .expect("check ran");
        assert!(result.breached);
    }

    #[test]
    fn checks_run_at_the_configured_cadence() {
        let params = Parameters::default();
        let mut monitor = GeofenceMonitor::new();
        let gpos = global_at(47.0, 8.0, 410.0);
        assert!(monitor
            .update(
                &params,
                &home(),
                Some(&gpos),
                None,
                VehicleType::RotaryWing,
                Timestamp::from_millis(1_000)
            )
            .is_some());
        assert!(monitor
            .update(
                &params,
                &home(),
                Some(&gpos),
                None,
                VehicleType::RotaryWing,
                Timestamp::from_millis(1_100)
            )
            .is_none());
        assert!(monitor
            .update(
                &params,
                &home(),
                Some(&gpos),
                None,
                VehicleType::RotaryWing,
                Timestamp::from_millis(1_200)
            )
            .is_some());
    }
}
