//! Monotonic time for supervisory decisions
//!
//! Every debounce, timeout, and failsafe decision in the core uses a single
//! monotonic clock anchored at boot. Wall-clock time is only used for
//! persisted records and never for control flow.

use serde::{Deserialize, Serialize};

/// Monotonic timestamp in microseconds since boot
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The boot instant
    pub const ZERO: Timestamp = Timestamp(0);

    /// Create a timestamp from microseconds since boot
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Create a timestamp from milliseconds since boot
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1_000)
    }

    /// Create a timestamp from seconds since boot
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * 1_000_000)
    }

    /// Microseconds since boot
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Milliseconds since boot
    pub const fn as_millis(&self) -> u64 {
        self.0 / 1_000
    }

    /// Elapsed time since an earlier timestamp, saturating at zero
    pub fn elapsed_since(&self, earlier: Timestamp) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }
}

impl core::ops::Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(rhs.0))
    }
}

/// Duration in microseconds
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Duration(pub u64);

impl Duration {
    /// Zero-length duration
    pub const ZERO: Duration = Duration(0);

    /// Create a duration from microseconds
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Create a duration from milliseconds
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1_000)
    }

    /// Create a duration from seconds
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * 1_000_000)
    }

    /// Create a duration from fractional seconds, clamping negatives to zero
    pub fn from_secs_f32(secs: f32) -> Self {
        if secs <= 0.0 || !secs.is_finite() {
            Duration::ZERO
        } else {
            Self((secs * 1_000_000.0) as u64)
        }
    }

    /// Microseconds
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Milliseconds
    pub const fn as_millis(&self) -> u64 {
        self.0 / 1_000
    }

    /// Fractional seconds
    pub fn as_secs_f32(&self) -> f32 {
        self.0 as f32 / 1_000_000.0
    }

    /// Check if duration is zero
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

/// Boot-anchored monotonic clock backed by [`std::time::Instant`]
///
/// The commander and navigator tasks read the clock once per tick and pass
/// the snapshot down, so pure state-machine code never touches the host
/// clock and tests can drive time explicitly.
#[derive(Debug, Clone, Copy)]
pub struct BootClock {
    origin: std::time::Instant,
}

impl BootClock {
    /// Anchor a new clock at the current instant
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }

    /// Current monotonic time since the anchor
    pub fn now(&self) -> Timestamp {
        Timestamp(self.origin.elapsed().as_micros() as u64)
    }
}

impl Default for BootClock {
    fn default() -> Self {
        Self::new()
    }
}
