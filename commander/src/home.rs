//! Home position manager
//!
//! Home is established on the first arming past the boot holdoff, by
//! explicit command, or on the takeoff edge when in-air home is enabled.
//! Once a failsafe that needs home has fired, home stays valid for the
//! remainder of that action; only a shutdown invalidates it.

use uas_core_shared::sensors::{GlobalPosition, LocalPosition};
use uas_core_shared::status::HomePosition;
use uas_core_shared::time::{Duration, Timestamp};

/// Holdoff after boot before home may be set on arming
///
/// Suppresses overwriting a perfectly good home position when a
/// brown-out restart arms again within the first half second.
pub const BOOT_HOLDOFF: Duration = Duration::from_millis(500);

/// The home position manager
#[derive(Debug, Clone, Copy, Default)]
pub struct HomeManager {
    home: HomePosition,
}

impl HomeManager {
    /// A manager with no home set
    pub fn new() -> Self {
        Self {
            home: HomePosition::INVALID,
        }
    }

    /// The current home record
    pub const fn home(&self) -> &HomePosition {
        &self.home
    }

    /// Whether home may be used
    pub fn valid(&self) -> bool {
        self.home.usable()
    }

    /// Set home from the current position estimate
    ///
    /// Returns whether home changed. Does nothing without a global
    /// position or inside the boot holdoff.
    pub fn set_from_position(
        &mut self,
        global: Option<&GlobalPosition>,
        local: Option<&LocalPosition>,
        now: Timestamp,
    ) -> bool {
        if now.elapsed_since(Timestamp::ZERO) < BOOT_HOLDOFF {
            return false;
        }
        let Some(global) = global else {
            return false;
        };
        if !(global.lat.is_finite() && global.lon.is_finite() && global.alt.is_finite()) {
            return false;
        }
        self.home = HomePosition {
            lat: global.lat,
            lon: global.lon,
            alt: global.alt,
            yaw: local.map(|l| l.heading).unwrap_or(0.0),
            timestamp: now,
            valid: true,
        };
        true
    }

    /// Set home to an explicit position
    pub fn set_manual(&mut self, lat: f64, lon: f64, alt: f32, yaw: f32, now: Timestamp) -> bool {
        if !(lat.is_finite() && lon.is_finite() && alt.is_finite()) {
            return false;
        }
        self.home = HomePosition {
            lat,
            lon,
            alt,
            yaw,
            timestamp: now,
            valid: true,
        };
        true
    }

    /// Invalidate home on shutdown
    pub fn invalidate(&mut self) {
        self.home = HomePosition::INVALID;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global() -> GlobalPosition {
        GlobalPosition {
            lat: 47.3977,
            lon: 8.5456,
            alt: 488.0,
            timestamp: Timestamp::from_secs(1),
        }
    }

    #[test]
    fn boot_holdoff_suppresses_home_set() {
        let mut manager = HomeManager::new();
        assert!(!manager.set_from_position(
            Some(&global()),
            None,
            Timestamp::from_millis(300)
        ));
        assert!(!manager.valid());

        assert!(manager.set_from_position(
            Some(&global()),
            None,
            Timestamp::from_millis(600)
        ));
        assert!(manager.valid());
    }

    #[test]
    fn non_finite_positions_are_refused() {
        let mut manager = HomeManager::new();
        let mut gpos = global();
        gpos.lat = f64::NAN;
        assert!(!manager.set_from_position(Some(&gpos), None, Timestamp::from_secs(2)));
        assert!(!manager.set_manual(f64::INFINITY, 8.0, 400.0, 0.0, Timestamp::from_secs(2)));
    }

    #[test]
    fn manual_set_and_invalidate() {
        let mut manager = HomeManager::new();
        assert!(manager.set_manual(47.0, 8.0, 400.0, 1.0, Timestamp::from_secs(2)));
        assert!(manager.valid());
        assert_eq!(manager.home().alt, 400.0);
        manager.invalidate();
        assert!(!manager.valid());
    }
}
