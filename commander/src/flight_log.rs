//! Flight counter persistence
//!
//! An incrementing flight number is written to disk on every landing,
//! silently: no topic, no event. Log analysis tools use it to stitch
//! flights together across reboots.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use uas_core_shared::error::Result;

/// The persisted record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightLogRecord {
    /// Incrementing flight number
    pub flight_uuid: u64,
    /// Wall-clock time of the landing
    pub landed_at: DateTime<Utc>,
}

/// Handle to the persisted flight counter
#[derive(Debug)]
pub struct FlightLog {
    path: PathBuf,
    counter: u64,
}

impl FlightLog {
    /// Open the counter file, starting at zero when absent or unreadable
    pub fn open(path: PathBuf) -> Self {
        let counter = std::fs::read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str::<FlightLogRecord>(&text).ok())
            .map(|record| record.flight_uuid)
            .unwrap_or(0);
        Self { path, counter }
    }

    /// The current flight number
    pub const fn flight_uuid(&self) -> u64 {
        self.counter
    }

    /// Increment and persist on a landing
    pub fn record_landing(&mut self) -> Result<()> {
        self.counter += 1;
        let record = FlightLogRecord {
            flight_uuid: self.counter,
            landed_at: Utc::now(),
        };
        let text = serde_json::to_string_pretty(&record)?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("flight_log.json");

        let mut log = FlightLog::open(path.clone());
        assert_eq!(log.flight_uuid(), 0);
        log.record_landing().expect("record");
        log.record_landing().expect("record");
        assert_eq!(log.flight_uuid(), 2);

        let reopened = FlightLog::open(path);
        assert_eq!(reopened.flight_uuid(), 2);
    }

    #[test]
    fn missing_file_starts_at_zero() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = FlightLog::open(dir.path().join("absent.json"));
        assert_eq!(log.flight_uuid(), 0);
    }
}
