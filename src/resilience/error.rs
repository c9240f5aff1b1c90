//! Error types returned by protected calls.

use std::time::Duration;
use thiserror::Error;

/// Returned when a breaker refuses a call without invoking the operation.
#[derive(Debug, Clone, Error)]
#[error("circuit '{breaker}' is open (open for {open_for:?})")]
pub struct CircuitOpenError {
    /// Name of the breaker that rejected the call.
    pub breaker: String,
    /// Time spent in the current OPEN (or HALF_OPEN) state.
    pub open_for: Duration,
}

/// Outcome of a failed [`CircuitBreaker::call`](super::CircuitBreaker::call).
///
/// The caller can tell apart the three ways a protected call can fail
/// (rejection, deadline, operation error) from the one way it can end without
/// being judged at all (`Cancelled`).
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// The breaker is open; the operation was never invoked.
    #[error(transparent)]
    Open(#[from] CircuitOpenError),

    /// The operation did not finish within the breaker's deadline.
    #[error("call through '{breaker}' timed out after {after:?}")]
    Timeout { breaker: String, after: Duration },

    /// The operation ran and returned an error.
    #[error("operation failed: {0}")]
    Operation(E),

    /// The caller abandoned the call before it resolved. Not counted.
    #[error("call cancelled by caller")]
    Cancelled,
}

impl<E> CallError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, CallError::Open(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CallError::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CallError::Cancelled)
    }

    /// Returns the operation's own error, if that is what failed.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CallError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CallError::Open(_) => "rejected",
            CallError::Timeout { .. } => "timeout",
            CallError::Operation(_) => "error",
            CallError::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_message() {
        let err: CallError<std::io::Error> = CircuitOpenError {
            breaker: "primary".into(),
            open_for: Duration::from_secs(2),
        }
        .into();
        assert!(err.is_open());
        assert_eq!(err.kind(), "rejected");
        assert!(err.to_string().contains("circuit 'primary' is open"));
    }

    #[test]
    fn test_into_inner_only_for_operation_errors() {
        let err: CallError<&str> = CallError::Operation("boom");
        assert_eq!(err.into_inner(), Some("boom"));

        let err: CallError<&str> = CallError::Timeout {
            breaker: "primary".into(),
            after: Duration::from_millis(10),
        };
        assert!(err.is_timeout());
        assert_eq!(err.into_inner(), None);
    }
}
