//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Logical call:
//!     → circuit_breaker.rs (fail fast while open, limited probes while half-open)
//!     → bulkhead.rs (shed when max in-flight reached)
//!     → timeouts.rs (per-attempt deadline)
//!     → On failure: classifier.rs (reason + retryable)
//!         → retries.rs (gate: never retry protection rejections)
//!         → backoff.rs (exponential delay before the next attempt)
//!     → circuit_breaker.rs (record final result)
//! ```
//!
//! # Design Decisions
//! - Cheap in-memory checks run before any network I/O
//! - Retries run inside the bulkhead permit, never around it
//! - Every protection is an owned state machine, not an external library

pub mod backoff;
pub mod bulkhead;
pub mod circuit_breaker;
pub mod classifier;
pub mod retries;
pub mod timeouts;

pub use bulkhead::{Bulkhead, BulkheadPermit};
pub use circuit_breaker::{BreakerListener, BreakerPermit, CircuitBreaker, CircuitState};
pub use classifier::{CallOutcome, ErrorClassifier, ErrorReason, ProtectionEvent};
pub use retries::RetryDecisionPolicy;
