//! Metrics collection and exposition.
//!
//! # Metrics
//! - `client_requests_total` (counter): logical calls by service, method, result, reason, retryable
//! - `client_latency_ms` (histogram): end-to-end latency of a logical call
//! - `client_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `client_channel_pool_size` (gauge): connections in the pool
//! - `client_inflight` (gauge): calls holding a bulkhead permit

use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::{BreakerListener, CallOutcome, CircuitState};

/// Fire-and-forget metrics sink used by the caller.
pub trait MetricsSink: Send + Sync {
    fn record_call(&self, method: &str, latency_ms: u64, outcome: &CallOutcome);
    fn set_breaker_state(&self, code: i64);
    fn set_pool_size(&self, size: usize);
    fn set_inflight(&self, count: usize);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn record_call(&self, _method: &str, _latency_ms: u64, _outcome: &CallOutcome) {}
    fn set_breaker_state(&self, _code: i64) {}
    fn set_pool_size(&self, _size: usize) {}
    fn set_inflight(&self, _count: usize) {}
}

/// Sink backed by the global `metrics` recorder.
#[derive(Debug, Clone)]
pub struct PrometheusSink {
    service: String,
}

impl PrometheusSink {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl MetricsSink for PrometheusSink {
    fn record_call(&self, method: &str, latency_ms: u64, outcome: &CallOutcome) {
        ::metrics::counter!(
            "client_requests_total",
            "service" => self.service.clone(),
            "method" => method.to_string(),
            "result" => outcome.result_label(),
            "reason" => outcome.reason.as_str(),
            "retryable" => if outcome.retryable { "true" } else { "false" }
        )
        .increment(1);
        ::metrics::histogram!(
            "client_latency_ms",
            "service" => self.service.clone(),
            "method" => method.to_string()
        )
        .record(latency_ms as f64);
    }

    fn set_breaker_state(&self, code: i64) {
        ::metrics::gauge!("client_breaker_state", "service" => self.service.clone()).set(code as f64);
    }

    fn set_pool_size(&self, size: usize) {
        ::metrics::gauge!("client_channel_pool_size", "service" => self.service.clone())
            .set(size as f64);
    }

    fn set_inflight(&self, count: usize) {
        ::metrics::gauge!("client_inflight", "service" => self.service.clone()).set(count as f64);
    }
}

/// Forwards breaker transitions to a sink's state gauge.
pub struct BreakerStateReporter {
    sink: Arc<dyn MetricsSink>,
}

impl BreakerStateReporter {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self { sink }
    }
}

impl BreakerListener for BreakerStateReporter {
    fn on_transition(&self, _from: CircuitState, to: CircuitState) {
        self.sink.set_breaker_state(to.code());
    }
}

/// Install the Prometheus exporter with an HTTP listener on `addr`.
///
/// Must run inside a Tokio runtime. Failures are logged, never fatal.
pub fn init_metrics(addr: SocketAddr) {
    let result = PrometheusBuilder::new().with_http_listener(addr).install();
    match result {
        Ok(()) => {
            ::metrics::describe_counter!("client_requests_total", "Logical calls by outcome");
            ::metrics::describe_histogram!(
                "client_latency_ms",
                ::metrics::Unit::Milliseconds,
                "End-to-end latency of a logical call"
            );
            ::metrics::describe_gauge!("client_breaker_state", "0=closed, 1=open, 2=half-open");
            ::metrics::describe_gauge!("client_channel_pool_size", "Connections in the pool");
            ::metrics::describe_gauge!("client_inflight", "Calls holding a bulkhead permit");
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::ErrorReason;
    use std::sync::Mutex;

    #[test]
    fn test_prometheus_sink_renders_series() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let sink = PrometheusSink::new("work-backend");

        ::metrics::with_local_recorder(&recorder, || {
            sink.record_call(
                "Work",
                42,
                &CallOutcome::new(ErrorReason::BackendError, true, "RESOURCE_EXHAUSTED"),
            );
            sink.set_breaker_state(CircuitState::Open.code());
            sink.set_pool_size(4);
            sink.set_inflight(3);
        });

        let rendered = handle.render();
        assert!(rendered.contains("client_requests_total"));
        assert!(rendered.contains("reason=\"BACKEND_ERROR\""));
        assert!(rendered.contains("retryable=\"true\""));
        assert!(rendered.contains("client_latency_ms"));
        assert!(rendered.contains("client_breaker_state{service=\"work-backend\"} 1"));
        assert!(rendered.contains("client_channel_pool_size{service=\"work-backend\"} 4"));
        assert!(rendered.contains("client_inflight{service=\"work-backend\"} 3"));
    }

    #[derive(Default)]
    struct StateSink(Mutex<Vec<i64>>);

    impl MetricsSink for StateSink {
        fn record_call(&self, _: &str, _: u64, _: &CallOutcome) {}
        fn set_breaker_state(&self, code: i64) {
            self.0.lock().unwrap().push(code);
        }
        fn set_pool_size(&self, _: usize) {}
        fn set_inflight(&self, _: usize) {}
    }

    #[test]
    fn test_reporter_forwards_state_codes() {
        let sink = Arc::new(StateSink::default());
        let reporter = BreakerStateReporter::new(sink.clone());
        reporter.on_transition(CircuitState::Closed, CircuitState::Open);
        reporter.on_transition(CircuitState::Open, CircuitState::HalfOpen);
        assert_eq!(*sink.0.lock().unwrap(), vec![1, 2]);
    }
}
