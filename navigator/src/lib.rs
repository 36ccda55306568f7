//! # UAS Navigator
//!
//! The autonomous-mission executor: one active navigation mode at a
//! time, driven solely by the commander-published navigation state,
//! producing the position-setpoint triplet the downstream position
//! controller consumes. The navigator owns all mode objects; modes see
//! only a borrowed context with the operations they need.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod geofence_avoidance;
pub mod modes;
pub mod navigator;

pub use navigator::{run, Navigator};
