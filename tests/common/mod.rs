//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::time::Instant;

use resilient_caller::backend::{self, BackendConfig, BackendState};
use resilient_caller::config::CallerConfig;
use resilient_caller::observability::metrics::MetricsSink;
use resilient_caller::pool::ConnectionPool;
use resilient_caller::resilience::CallOutcome;
use resilient_caller::transport::{StatusCode, Transport, TransportError, WorkReply};
use resilient_caller::{RequestContext, ResilientCaller};

/// Fake transport that fails its first `fail_first` invocations.
pub struct ScriptedTransport {
    fail_first: usize,
    error: TransportError,
    delay: Option<Duration>,
    panics: bool,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
}

impl ScriptedTransport {
    pub fn fail_first(k: usize, error: TransportError) -> Self {
        Self {
            fail_first: k,
            error,
            delay: None,
            panics: false,
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
        }
    }

    pub fn always(code: StatusCode) -> Self {
        Self::fail_first(usize::MAX, TransportError::status(code, "scripted failure"))
    }

    pub fn healthy() -> Self {
        Self::fail_first(0, TransportError::Closed)
    }

    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::healthy()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Gaps between consecutive invocations.
    pub fn gaps(&self) -> Vec<Duration> {
        let times = self.call_times.lock().unwrap();
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn invoke(&self, _ctx: &RequestContext) -> Result<WorkReply, TransportError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());
        if self.panics {
            panic!("scripted transport fault");
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if n < self.fail_first {
            Err(self.error.clone())
        } else {
            Ok(WorkReply::success())
        }
    }
}

/// Metrics sink that keeps everything it is given.
#[derive(Default)]
pub struct RecordingSink {
    pub calls: Mutex<Vec<(String, u64, CallOutcome)>>,
    pub breaker_states: Mutex<Vec<i64>>,
    pub pool_size: AtomicUsize,
    pub inflight: Mutex<Vec<usize>>,
}

impl RecordingSink {
    pub fn outcomes(&self) -> Vec<CallOutcome> {
        self.calls.lock().unwrap().iter().map(|c| c.2.clone()).collect()
    }

    pub fn states(&self) -> Vec<i64> {
        self.breaker_states.lock().unwrap().clone()
    }

    pub fn last_inflight(&self) -> Option<usize> {
        self.inflight.lock().unwrap().last().copied()
    }
}

impl MetricsSink for RecordingSink {
    fn record_call(&self, method: &str, latency_ms: u64, outcome: &CallOutcome) {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), latency_ms, outcome.clone()));
    }

    fn set_breaker_state(&self, code: i64) {
        self.breaker_states.lock().unwrap().push(code);
    }

    fn set_pool_size(&self, size: usize) {
        self.pool_size.store(size, Ordering::SeqCst);
    }

    fn set_inflight(&self, count: usize) {
        self.inflight.lock().unwrap().push(count);
    }
}

/// Caller over scripted transports, one per pool slot.
pub fn scripted_caller(
    config: &CallerConfig,
    transports: &[Arc<ScriptedTransport>],
    sink: Arc<RecordingSink>,
) -> ResilientCaller {
    let pool = ConnectionPool::new(
        transports
            .iter()
            .map(|t| Arc::clone(t) as Arc<dyn Transport>)
            .collect(),
    )
    .unwrap();
    ResilientCaller::new(config, pool, sink)
}

/// Start the demo Work backend on an ephemeral port.
pub async fn start_work_backend(config: BackendConfig) -> (SocketAddr, BackendState) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = BackendState::new(config);
    let served = state.clone();
    tokio::spawn(async move {
        let _ = backend::serve(listener, served).await;
    });
    (addr, state)
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
