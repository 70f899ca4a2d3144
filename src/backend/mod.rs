//! Demo "Work" downstream.
//!
//! # Data Flow
//! ```text
//! POST /work {"id": ..}
//!     → cache.rs (fresh reply for this id? return it)
//!     → fail injection (RESOURCE_EXHAUSTED, 429)
//!     → single worker mutex
//!     → processing delay
//!     → reply cached under the id
//! GET /health
//! ```
//!
//! # Design Decisions
//! - Failure injection happens before the worker lock, so rejected calls never queue
//! - Replies are cached per request id, so a retried call is idempotent
//! - The failure status travels in the `x-status` header understood by `HttpChannel`

pub mod cache;
pub mod handlers;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::backend::cache::ReplyCache;

/// Behavior knobs of the demo backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Probability in [0, 1] that a call fails with RESOURCE_EXHAUSTED.
    pub fail_rate: f64,
    pub delay: Duration,
    pub cache_ttl: Duration,
    /// Serialize processing through one worker.
    pub single_worker: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            fail_rate: 0.0,
            delay: Duration::from_millis(5),
            cache_ttl: Duration::from_secs(30),
            single_worker: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct BackendCounters {
    pub received: AtomicU64,
    pub failed: AtomicU64,
    pub completed: AtomicU64,
    pub cache_hits: AtomicU64,
}

/// Shared handler state.
#[derive(Clone)]
pub struct BackendState {
    pub config: Arc<BackendConfig>,
    pub cache: ReplyCache,
    pub counters: Arc<BackendCounters>,
    worker: Arc<Mutex<()>>,
}

impl BackendState {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            cache: ReplyCache::new(config.cache_ttl),
            config: Arc::new(config),
            counters: Arc::new(BackendCounters::default()),
            worker: Arc::new(Mutex::new(())),
        }
    }
}

/// Routes of the demo backend.
pub fn router(state: BackendState) -> Router {
    Router::new()
        .route("/work", post(handlers::work))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Serve the backend on `listener` until the process exits.
/// Accepts prior-knowledge HTTP/2 as well as HTTP/1.1.
pub async fn serve(listener: TcpListener, state: BackendState) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(
        address = %addr,
        fail_rate = state.config.fail_rate,
        delay_ms = state.config.delay.as_millis() as u64,
        single_worker = state.config.single_worker,
        "Work backend listening"
    );
    axum::serve(listener, router(state)).await
}
