//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! ResilientCaller, CircuitBreaker, HttpChannel produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (MetricsSink: counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout via the fmt layer
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - The caller only knows the `MetricsSink` trait; sink calls never fail
//! - Request ID is attached to every per-call event
//! - Metrics are off by default; `NoopSink` is used until enabled

pub mod logging;
pub mod metrics;
