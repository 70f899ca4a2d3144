//! Client-side resilience layer for a remote unary "Work" operation.
//!
//! Circuit breaking, a concurrency bulkhead, per-attempt deadlines and gated retry,
//! composed into one pipeline over a pool of independent connections.

// Decision pipeline
pub mod caller;
pub mod pool;
pub mod resilience;

// Collaborators
pub mod backend;
pub mod transport;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use caller::{CallResult, LayerSet, RequestContext, ResilientCaller};
pub use config::schema::CallerConfig;
pub use lifecycle::Shutdown;
