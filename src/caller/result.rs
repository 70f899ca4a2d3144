//! Caller-facing result of a logical call.

use serde::Serialize;

use crate::resilience::{CallOutcome, ErrorReason};
use crate::transport::WorkReply;

/// Code reported for a call aborted by its cancellation signal.
pub const CANCELLED_CODE: &str = "CANCELLED";

/// Outcome of `ResilientCaller::call`. Never an error: every failure mode lands here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallResult {
    pub ok: bool,
    /// Reply code on success, otherwise the reason name.
    pub code: String,
    pub latency_ms: u64,
    pub reason: ErrorReason,
    /// Transport attempts made; 0 for protection rejections.
    pub attempts: u32,
}

impl CallResult {
    pub fn from_reply(reply: WorkReply, latency_ms: u64, attempts: u32) -> Self {
        Self {
            ok: reply.ok,
            code: reply.code,
            latency_ms,
            reason: ErrorReason::Success,
            attempts,
        }
    }

    pub fn failure(outcome: &CallOutcome, latency_ms: u64, attempts: u32) -> Self {
        Self {
            ok: false,
            code: outcome.reason.as_str().to_string(),
            latency_ms,
            reason: outcome.reason,
            attempts,
        }
    }

    pub fn cancelled(latency_ms: u64, attempts: u32) -> Self {
        Self {
            ok: false,
            code: CANCELLED_CODE.to_string(),
            latency_ms,
            reason: ErrorReason::Unknown,
            attempts,
        }
    }

    /// Rejected by the breaker or the bulkhead before any I/O.
    pub fn is_rejection(&self) -> bool {
        self.reason.is_protection()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_uses_reason_name_as_code() {
        let outcome = CallOutcome::new(ErrorReason::BackendError, true, "RESOURCE_EXHAUSTED");
        let result = CallResult::failure(&outcome, 150, 3);
        assert!(!result.ok);
        assert_eq!(result.code, "BACKEND_ERROR");
        assert_eq!(result.attempts, 3);
        assert!(!result.is_rejection());
    }

    #[test]
    fn test_serializes_reason_in_screaming_case() {
        let outcome = CallOutcome::new(ErrorReason::CircuitOpen, false, "CIRCUIT_OPEN");
        let json = serde_json::to_value(CallResult::failure(&outcome, 0, 0)).unwrap();
        assert_eq!(json["reason"], "CIRCUIT_OPEN");
        assert_eq!(json["ok"], false);
        assert_eq!(json["latency_ms"], 0);
    }
}
