//! Structured operator events and user-feedback records
//!
//! Free-form log lines are fine for engineers but useless for a ground
//! station that needs to localise messages. Operator-facing conditions
//! are therefore published as [`Event`] records with a stable id, next
//! to the acoustic and LED cues that accompany them.

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Severity of an operator event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Informational
    Info,
    /// Needs operator attention
    Warning,
    /// Safety-relevant condition
    Critical,
    /// Immediate danger to the vehicle
    Emergency,
}

/// A structured operator event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Stable id used by downstream localisation
    pub id: &'static str,
    /// How urgent the event is
    pub severity: Severity,
    /// Rendered message for direct display and logs
    pub message: String,
    /// When the event occurred
    pub timestamp: Timestamp,
}

impl Event {
    /// Build an event
    pub fn new(
        id: &'static str,
        severity: Severity,
        message: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            severity,
            message: message.into(),
            timestamp,
        }
    }
}

/// Identifier of a predefined tune played by the buzzer driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TuneId {
    /// Boot-complete jingle
    Startup,
    /// Positive confirmation
    NotifyPositive,
    /// Negative confirmation, played on denied or failed requests
    NotifyNegative,
    /// Arming warning
    ArmingWarning,
    /// Fast battery warning
    BatteryWarningFast,
    /// Parachute release announcement
    ParachuteRelease,
    /// Single short beep
    SingleBeep,
}

/// Acoustic cue record consumed by the buzzer driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuneControl {
    /// Which tune to play
    pub tune: TuneId,
    /// When the cue was requested
    pub timestamp: Timestamp,
}

/// LED colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedColor {
    /// LEDs off
    Off,
    /// Red
    Red,
    /// Green
    Green,
    /// Blue
    Blue,
    /// Amber
    Amber,
    /// Purple
    Purple,
    /// White
    White,
}

/// LED animation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedMode {
    /// Steady on
    On,
    /// Slow breathing animation
    Breathe,
    /// Slow blink
    BlinkSlow,
    /// Fast blink
    BlinkFast,
}

/// LED state record consumed by the LED driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedControl {
    /// Colour to show
    pub color: LedColor,
    /// Animation mode
    pub mode: LedMode,
    /// When the state was selected
    pub timestamp: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders() {
        assert!(Severity::Emergency > Severity::Critical);
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }
}
