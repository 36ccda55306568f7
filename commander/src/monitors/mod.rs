//! Debounced watchdogs feeding the failsafe resolver
//!
//! Each monitor is a synchronous `update` driven from the commander
//! tick. Monitors never publish; they return plain state structs and
//! edge flags, and the commander decides what becomes an event, a topic
//! record, or a failsafe input.

mod auto_disarm;
mod battery;
mod geofence;
mod link;
mod wind;

pub use auto_disarm::AutoDisarm;
pub use battery::{BatteryMonitor, BatteryState};
pub use geofence::GeofenceMonitor;
pub use link::{LinkMonitor, LinkState};
pub use wind::{WindMonitor, WindState};
