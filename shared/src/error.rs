//! Error types for the supervisory core
//!
//! Errors are classified by cause, not by the type that produced them:
//! a precondition failure is refused outright, a transient rejection may
//! be retried by the caller, and a fatal condition is latched and never
//! silently cleared. Each class maps onto exactly one command ACK result.

use thiserror::Error;

use crate::command::AckResult;

/// Standard result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Cause-oriented error for supervisory operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// A required precondition does not hold; no state was changed
    #[error("precondition failed: {reason}")]
    Precondition {
        /// What was missing
        reason: &'static str,
    },

    /// The operation may succeed later; the caller may retry
    #[error("temporarily rejected: {reason}")]
    Transient {
        /// What is currently in the way
        reason: &'static str,
    },

    /// The command is not handled in this configuration
    #[error("unsupported: {what}")]
    Unsupported {
        /// The unhandled operation
        what: &'static str,
    },

    /// The operation was accepted but could not complete
    #[error("operation failed: {reason}")]
    Failed {
        /// What went wrong
        reason: String,
    },

    /// A lockdown or termination trigger; recorded, never silently cleared
    #[error("fatal: {reason}")]
    Fatal {
        /// The trigger
        reason: &'static str,
    },

    /// Filesystem access failed (parameter, fence, or flight-log files)
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record could not be parsed or encoded
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl CoreError {
    /// The ACK result reported to the requester for this error
    pub fn ack_result(&self) -> AckResult {
        match self {
            CoreError::Precondition { .. } => AckResult::Denied,
            CoreError::Transient { .. } => AckResult::TemporarilyRejected,
            CoreError::Unsupported { .. } => AckResult::Unsupported,
            CoreError::Failed { .. } | CoreError::Io(_) | CoreError::Serde(_) => AckResult::Failed,
            CoreError::Fatal { .. } => AckResult::Failed,
        }
    }

    /// Whether the caller may reasonably retry
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CoreError::Transient { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_ack_results() {
        assert_eq!(
            CoreError::Precondition { reason: "no home" }.ack_result(),
            AckResult::Denied
        );
        assert_eq!(
            CoreError::Transient {
                reason: "no position estimate"
            }
            .ack_result(),
            AckResult::TemporarilyRejected
        );
        assert_eq!(
            CoreError::Unsupported { what: "actuator test" }.ack_result(),
            AckResult::Unsupported
        );
        assert_eq!(
            CoreError::Failed {
                reason: "worker died".into()
            }
            .ack_result(),
            AckResult::Failed
        );
    }

    #[test]
    fn only_transient_is_recoverable() {
        assert!(CoreError::Transient { reason: "busy" }.is_recoverable());
        assert!(!CoreError::Precondition { reason: "armed" }.is_recoverable());
        assert!(!CoreError::Fatal { reason: "termination" }.is_recoverable());
    }
}
