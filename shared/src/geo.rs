//! Geodetic helpers and geofence geometry
//!
//! Small-angle spherical-earth math is sufficient at the distances a
//! geofence or return flight covers. Polygon containment is consumed as
//! library math by the monitors; the core never iterates vertices itself.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Mean earth radius in metres
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates in metres
pub fn distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Initial bearing from the first to the second coordinate in radians
pub fn bearing_rad(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let y = delta_lon.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * delta_lon.cos();
    y.atan2(x)
}

/// Destination point from a start coordinate along a bearing
pub fn project(lat: f64, lon: f64, bearing: f64, distance: f64) -> (f64, f64) {
    let angular = distance / EARTH_RADIUS_M;
    let lat_rad = lat.to_radians();
    let lon_rad = lon.to_radians();

    let dest_lat = (lat_rad.sin() * angular.cos()
        + lat_rad.cos() * angular.sin() * bearing.cos())
    .asin();
    let dest_lon = lon_rad
        + (bearing.sin() * angular.sin() * lat_rad.cos())
            .atan2(angular.cos() - lat_rad.sin() * dest_lat.sin());

    (dest_lat.to_degrees(), dest_lon.to_degrees())
}

/// A fence polygon in geodetic coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FencePolygon {
    /// Vertices as (latitude, longitude) pairs in degrees
    pub vertices: Vec<(f64, f64)>,
}

impl FencePolygon {
    /// Ray-cast containment test
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        if self.vertices.len() < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = self.vertices.len() - 1;
        for i in 0..self.vertices.len() {
            let (lat_i, lon_i) = self.vertices[i];
            let (lat_j, lon_j) = self.vertices[j];
            if ((lon_i > lon) != (lon_j > lon))
                && (lat < (lat_j - lat_i) * (lon - lon_i) / (lon_j - lon_i) + lat_i)
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

/// A circular fence in geodetic coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FenceCircle {
    /// Centre latitude in degrees
    pub lat: f64,
    /// Centre longitude in degrees
    pub lon: f64,
    /// Radius in metres
    pub radius_m: f64,
}

impl FenceCircle {
    /// Containment test
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        distance_m(self.lat, self.lon, lat, lon) <= self.radius_m
    }
}

/// One inclusion shape of a fence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FenceShape {
    /// Stay inside this polygon
    Polygon(FencePolygon),
    /// Stay inside this circle
    Circle(FenceCircle),
}

impl FenceShape {
    /// Containment test
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        match self {
            FenceShape::Polygon(polygon) => polygon.contains(lat, lon),
            FenceShape::Circle(circle) => circle.contains(lat, lon),
        }
    }
}

/// The persisted fence description
///
/// An empty fence restricts nothing. With inclusion shapes present, a
/// position is acceptable when any shape contains it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FenceFile {
    /// Inclusion shapes
    #[serde(default)]
    pub inclusion: Vec<FenceShape>,
}

impl FenceFile {
    /// Load a fence description from a JSON file
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Whether the fence has any shapes
    pub fn is_empty(&self) -> bool {
        self.inclusion.is_empty()
    }

    /// Whether the position is acceptable under this fence
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.is_empty() || self.inclusion.iter().any(|shape| shape.contains(lat, lon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_of_one_degree_latitude() {
        let d = distance_m(47.0, 8.0, 48.0, 8.0);
        // one degree of latitude is roughly 111 km
        assert!((d - 111_195.0).abs() < 500.0, "got {d}");
    }

    #[test]
    fn projection_inverts_distance_and_bearing() {
        let (lat, lon) = (47.3977, 8.5456);
        let bearing = 0.8_f64;
        let (dest_lat, dest_lon) = project(lat, lon, bearing, 2_000.0);
        let d = distance_m(lat, lon, dest_lat, dest_lon);
        assert!((d - 2_000.0).abs() < 1.0, "got {d}");
        let b = bearing_rad(lat, lon, dest_lat, dest_lon);
        assert!((b - bearing).abs() < 1e-3, "got {b}");
    }

    #[test]
    fn square_polygon_containment() {
        let polygon = FencePolygon {
            vertices: vec![(47.0, 8.0), (47.0, 8.1), (47.1, 8.1), (47.1, 8.0)],
        };
        assert!(polygon.contains(47.05, 8.05));
        assert!(!polygon.contains(47.2, 8.05));
        assert!(!polygon.contains(47.05, 8.2));
    }

    #[test]
    fn empty_fence_restricts_nothing() {
        let fence = FenceFile::default();
        assert!(fence.contains(0.0, 0.0));
        assert!(fence.contains(47.0, 8.0));
    }

    #[test]
    fn circle_fence_bounds() {
        let fence = FenceFile {
            inclusion: vec![FenceShape::Circle(FenceCircle {
                lat: 47.0,
                lon: 8.0,
                radius_m: 500.0,
            })],
        };
        assert!(fence.contains(47.0, 8.0));
        let (lat, lon) = project(47.0, 8.0, 1.0, 499.0);
        assert!(fence.contains(lat, lon));
        let (lat, lon) = project(47.0, 8.0, 1.0, 501.0);
        assert!(!fence.contains(lat, lon));
    }
}
