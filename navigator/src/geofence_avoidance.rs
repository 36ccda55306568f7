//! Geofence breach avoidance
//!
//! When the geofence monitor predicts a breach, the navigator steers
//! back with a corrective loiter point: from the current position
//! towards home, far enough in that the braking distance of the current
//! speed stays inside the fence.

use uas_core_shared::geo;
use uas_core_shared::params::Parameters;
use uas_core_shared::sensors::{GlobalPosition, LocalPosition};
use uas_core_shared::setpoint::PositionSetpoint;
use uas_core_shared::status::HomePosition;

/// Extra pull-back beyond the braking distance, metres
const CORRECTIVE_MARGIN_M: f64 = 10.0;

/// Compute the corrective loiter setpoint for a predicted breach
///
/// Returns `None` without a global position or a usable home.
pub fn corrective_loiter(
    params: &Parameters,
    home: &HomePosition,
    global: Option<&GlobalPosition>,
    local: Option<&LocalPosition>,
) -> Option<PositionSetpoint> {
    let global = global?;
    if !home.usable() {
        return None;
    }

    let speed = local
        .filter(|l| l.v_xy_valid)
        .map(|l| f64::from(l.ground_speed()))
        .unwrap_or(0.0);
    let braking = if params.horizontal_brake_decel > 0.0 {
        speed * speed / (2.0 * f64::from(params.horizontal_brake_decel))
    } else {
        0.0
    };
    let pull_back = braking + CORRECTIVE_MARGIN_M;

    let bearing_home = geo::bearing_rad(global.lat, global.lon, home.lat, home.lon);
    let distance_home = geo::distance_m(global.lat, global.lon, home.lat, home.lon);
    // never overshoot past home
    let distance = pull_back.min(distance_home);
    let (lat, lon) = geo::project(global.lat, global.lon, bearing_home, distance);

    Some(PositionSetpoint::loiter(
        lat,
        lon,
        global.alt,
        params.loiter_radius,
    ))
}
