//! Resilient caller subsystem.
//!
//! # Data Flow
//! ```text
//! call(request_id)
//!     → CircuitBreaker permission   (denied: CIRCUIT_OPEN, no I/O)
//!     → Bulkhead permit             (denied: BULKHEAD_REJECTED, breaker slot released)
//!     → ConnectionPool::select
//!     → attempt loop: deadline-bound invoke → classify → should_retry → backoff
//!     → breaker result, bulkhead release
//!     → MetricsSink::record_call / set_inflight
//!     → CallResult
//! ```
//!
//! # Design Decisions
//! - One orchestrator; scenarios differ only in the enabled `LayerSet`
//! - Cheap checks run before expensive ones, so rejections never touch the network
//! - Permits are RAII guards, released on every exit path including panic and cancellation

pub mod context;
pub mod orchestrator;
pub mod result;

pub use context::RequestContext;
pub use orchestrator::{CallerError, LayerSet, ResilientCaller};
pub use result::CallResult;
