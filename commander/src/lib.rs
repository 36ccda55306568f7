//! # UAS Commander
//!
//! The supervisory state machine of the flight core: arming and flight
//! mode arbitration, health and arming gates, the multi-source failsafe
//! decision engine, home management, and the monitors that feed them.
//! The commander consumes topic snapshots from the shared bus and
//! publishes complete output records; it owns no hardware and computes
//! no trajectories.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod actions;
pub mod arm_state;
pub mod checks;
pub mod commander;
mod commands;
pub mod control_mode;
pub mod failsafe;
pub mod failure_detector;
pub mod flight_log;
pub mod flight_mode;
pub mod home;
pub mod monitors;
pub mod worker;

pub use commander::{run, Commander, CommanderConfig, PUBLISH_INTERVAL, TICK_INTERVAL};
pub use worker::CalibrationKind;
