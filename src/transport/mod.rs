//! Transport subsystem.
//!
//! # Data Flow
//! ```text
//! ResilientCaller attempt
//!     → pool selects a connection (anything implementing Transport)
//!     → Transport::invoke(ctx) performs the remote "Work" call
//!     → Ok(WorkReply) or Err(TransportError { code() })
//!     → resilience::classifier turns the error into a CallOutcome
//! ```
//!
//! # Design Decisions
//! - The core depends only on the `Transport` trait, never on a wire protocol
//! - Status codes use the gRPC canonical vocabulary so the classifier table is protocol-neutral
//! - `http.rs` is one concrete adapter (HTTP/2 with keepalive); tests use in-memory fakes

pub mod http;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::caller::RequestContext;

/// Canonical status codes reported by the downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl StatusCode {
    /// Canonical upper-case name, e.g. `RESOURCE_EXHAUSTED`.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Cancelled => "CANCELLED",
            StatusCode::Unknown => "UNKNOWN",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::AlreadyExists => "ALREADY_EXISTS",
            StatusCode::PermissionDenied => "PERMISSION_DENIED",
            StatusCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            StatusCode::FailedPrecondition => "FAILED_PRECONDITION",
            StatusCode::Aborted => "ABORTED",
            StatusCode::OutOfRange => "OUT_OF_RANGE",
            StatusCode::Unimplemented => "UNIMPLEMENTED",
            StatusCode::Internal => "INTERNAL",
            StatusCode::Unavailable => "UNAVAILABLE",
            StatusCode::DataLoss => "DATA_LOSS",
            StatusCode::Unauthenticated => "UNAUTHENTICATED",
        }
    }

    /// Map an HTTP response status onto the canonical vocabulary.
    pub fn from_http(status: hyper::StatusCode) -> Self {
        match status.as_u16() {
            200..=299 => StatusCode::Ok,
            400 => StatusCode::InvalidArgument,
            401 => StatusCode::Unauthenticated,
            403 => StatusCode::PermissionDenied,
            404 => StatusCode::NotFound,
            409 => StatusCode::Aborted,
            429 => StatusCode::ResourceExhausted,
            499 => StatusCode::Cancelled,
            500 => StatusCode::Internal,
            501 => StatusCode::Unimplemented,
            502 | 503 => StatusCode::Unavailable,
            504 => StatusCode::DeadlineExceeded,
            _ => StatusCode::Unknown,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a status name is not part of the canonical set.
#[derive(Debug, Error)]
#[error("unrecognized status code: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for StatusCode {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = match s.trim().to_ascii_uppercase().as_str() {
            "OK" => StatusCode::Ok,
            "CANCELLED" => StatusCode::Cancelled,
            "UNKNOWN" => StatusCode::Unknown,
            "INVALID_ARGUMENT" => StatusCode::InvalidArgument,
            "DEADLINE_EXCEEDED" => StatusCode::DeadlineExceeded,
            "NOT_FOUND" => StatusCode::NotFound,
            "ALREADY_EXISTS" => StatusCode::AlreadyExists,
            "PERMISSION_DENIED" => StatusCode::PermissionDenied,
            "RESOURCE_EXHAUSTED" => StatusCode::ResourceExhausted,
            "FAILED_PRECONDITION" => StatusCode::FailedPrecondition,
            "ABORTED" => StatusCode::Aborted,
            "OUT_OF_RANGE" => StatusCode::OutOfRange,
            "UNIMPLEMENTED" => StatusCode::Unimplemented,
            "INTERNAL" => StatusCode::Internal,
            "UNAVAILABLE" => StatusCode::Unavailable,
            "DATA_LOSS" => StatusCode::DataLoss,
            "UNAUTHENTICATED" => StatusCode::Unauthenticated,
            other => return Err(UnknownStatus(other.to_string())),
        };
        Ok(code)
    }
}

/// Errors raised by a single transport attempt.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The downstream answered with a non-OK status.
    #[error("{code}: {message}")]
    Status { code: StatusCode, message: String },

    /// An established connection was reset mid-call.
    #[error("connection reset: {0}")]
    ConnectionReset(String),

    /// A connection could not be established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The per-attempt deadline elapsed before a reply arrived.
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// The connection was closed by shutdown.
    #[error("connection closed")]
    Closed,

    /// The reply could not be decoded.
    #[error("invalid reply: {0}")]
    InvalidReply(String),
}

impl TransportError {
    /// Shorthand for a status failure.
    pub fn status(code: StatusCode, message: impl Into<String>) -> Self {
        TransportError::Status {
            code,
            message: message.into(),
        }
    }

    /// Canonical status code for this error.
    pub fn code(&self) -> StatusCode {
        match self {
            TransportError::Status { code, .. } => *code,
            TransportError::ConnectionReset(_) | TransportError::Connect(_) => StatusCode::Unavailable,
            TransportError::DeadlineExceeded(_) => StatusCode::DeadlineExceeded,
            TransportError::Closed => StatusCode::Cancelled,
            TransportError::InvalidReply(_) => StatusCode::Internal,
        }
    }

    /// Whether the failure was a transport-level connection reset.
    pub fn is_connection_reset(&self) -> bool {
        matches!(self, TransportError::ConnectionReset(_))
    }
}

/// Reply of a successful "Work" call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkReply {
    pub ok: bool,
    pub code: String,
}

impl WorkReply {
    pub fn success() -> Self {
        Self {
            ok: true,
            code: "SUCCESS".to_string(),
        }
    }
}

/// One connection to the downstream "Work" operation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one attempt of the remote call.
    async fn invoke(&self, ctx: &RequestContext) -> Result<WorkReply, TransportError>;

    /// Release the underlying connection. Later invocations fail with `Closed`.
    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_names_round_trip() {
        let code: StatusCode = "resource_exhausted".parse().unwrap();
        assert_eq!(code, StatusCode::ResourceExhausted);
        assert_eq!(code.to_string(), "RESOURCE_EXHAUSTED");
        assert!("NOT_A_CODE".parse::<StatusCode>().is_err());
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(StatusCode::from_http(hyper::StatusCode::OK), StatusCode::Ok);
        assert_eq!(
            StatusCode::from_http(hyper::StatusCode::TOO_MANY_REQUESTS),
            StatusCode::ResourceExhausted
        );
        assert_eq!(
            StatusCode::from_http(hyper::StatusCode::SERVICE_UNAVAILABLE),
            StatusCode::Unavailable
        );
        assert_eq!(
            StatusCode::from_http(hyper::StatusCode::GATEWAY_TIMEOUT),
            StatusCode::DeadlineExceeded
        );
        assert_eq!(
            StatusCode::from_http(hyper::StatusCode::IM_A_TEAPOT),
            StatusCode::Unknown
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            TransportError::ConnectionReset("rst".into()).code(),
            StatusCode::Unavailable
        );
        assert_eq!(
            TransportError::DeadlineExceeded(Duration::from_millis(800)).code(),
            StatusCode::DeadlineExceeded
        );
        assert_eq!(TransportError::Closed.code(), StatusCode::Cancelled);

        let err = TransportError::status(StatusCode::ResourceExhausted, "rate limited");
        assert_eq!(err.to_string(), "RESOURCE_EXHAUSTED: rate limited");
    }
}
