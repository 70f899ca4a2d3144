//! Error classification.
//!
//! # Responsibilities
//! - Map a transport failure or a protection rejection to a semantic `ErrorReason`
//! - Decide whether the failure is transient (`retryable`)
//!
//! # Design Decisions
//! - Pure and deterministic: same inputs, same `CallOutcome`
//! - Protection events take precedence over any transport error
//! - Anything unrecognized is `Unknown` and never retryable (fail closed)

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::transport::{StatusCode, TransportError};

/// Fixed taxonomy of call outcomes. Used as the `reason` metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorReason {
    Success,
    ConnectionFailure,
    Timeout,
    BackendError,
    ClientError,
    ServerError,
    CircuitOpen,
    BulkheadRejected,
    Unknown,
}

impl ErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorReason::Success => "SUCCESS",
            ErrorReason::ConnectionFailure => "CONNECTION_FAILURE",
            ErrorReason::Timeout => "TIMEOUT",
            ErrorReason::BackendError => "BACKEND_ERROR",
            ErrorReason::ClientError => "CLIENT_ERROR",
            ErrorReason::ServerError => "SERVER_ERROR",
            ErrorReason::CircuitOpen => "CIRCUIT_OPEN",
            ErrorReason::BulkheadRejected => "BULKHEAD_REJECTED",
            ErrorReason::Unknown => "UNKNOWN",
        }
    }

    /// True for rejections raised by the protection layers themselves.
    pub fn is_protection(&self) -> bool {
        matches!(self, ErrorReason::CircuitOpen | ErrorReason::BulkheadRejected)
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejection raised by a protection layer before any transport I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtectionEvent {
    CircuitOpen,
    BulkheadRejected,
}

impl ProtectionEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtectionEvent::CircuitOpen => "CIRCUIT_OPEN",
            ProtectionEvent::BulkheadRejected => "BULKHEAD_REJECTED",
        }
    }
}

/// Classification of one call attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOutcome {
    pub reason: ErrorReason,
    pub retryable: bool,
    pub detail: String,
}

impl CallOutcome {
    pub fn new(reason: ErrorReason, retryable: bool, detail: impl Into<String>) -> Self {
        Self {
            reason,
            retryable,
            detail: detail.into(),
        }
    }

    pub fn success() -> Self {
        Self::new(ErrorReason::Success, false, "OK")
    }

    pub fn is_success(&self) -> bool {
        self.reason == ErrorReason::Success
    }

    /// `SUCCESS` or `FAILURE`, the `result` metrics label.
    pub fn result_label(&self) -> &'static str {
        if self.is_success() {
            "SUCCESS"
        } else {
            "FAILURE"
        }
    }
}

/// Maps failures to `CallOutcome`s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(
        &self,
        failure: Option<&TransportError>,
        hint: Option<ProtectionEvent>,
    ) -> CallOutcome {
        if let Some(event) = hint {
            let reason = match event {
                ProtectionEvent::CircuitOpen => ErrorReason::CircuitOpen,
                ProtectionEvent::BulkheadRejected => ErrorReason::BulkheadRejected,
            };
            return CallOutcome::new(reason, false, event.as_str());
        }

        let Some(error) = failure else {
            return CallOutcome::success();
        };

        if error.is_connection_reset() {
            return CallOutcome::new(ErrorReason::ConnectionFailure, true, "CONNECTION_RESET");
        }

        let code = error.code();
        let (reason, retryable) = match code {
            StatusCode::Unavailable => (ErrorReason::ConnectionFailure, true),
            StatusCode::DeadlineExceeded => (ErrorReason::Timeout, false),
            StatusCode::ResourceExhausted => (ErrorReason::BackendError, true),
            StatusCode::InvalidArgument
            | StatusCode::Unauthenticated
            | StatusCode::PermissionDenied
            | StatusCode::NotFound => (ErrorReason::ClientError, false),
            StatusCode::Internal | StatusCode::DataLoss | StatusCode::Unimplemented => {
                (ErrorReason::ServerError, false)
            }
            _ => (ErrorReason::Unknown, false),
        };
        CallOutcome::new(reason, retryable, code.as_str())
    }
}
