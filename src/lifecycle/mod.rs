//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT (Ctrl-C) → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → every `cancelled()` future resolves
//!             → in-flight calls abort and release their permits
//!             → ResilientCaller::shutdown closes the pool
//! ```
//!
//! # Design Decisions
//! - Cancellation is cooperative: callers race their work against `cancelled()`
//! - A trigger is sticky, so late subscribers observe it too

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
