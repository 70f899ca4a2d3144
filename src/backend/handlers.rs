use std::sync::atomic::Ordering;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::backend::BackendState;
use crate::transport::http::X_STATUS;
use crate::transport::WorkReply;

#[derive(Debug, Deserialize)]
pub struct WorkRequest {
    #[serde(default)]
    pub id: String,
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub received: u64,
    pub completed: u64,
    pub failed: u64,
}

pub async fn work(State(state): State<BackendState>, Json(request): Json<WorkRequest>) -> Response {
    let started = Instant::now();
    state.counters.received.fetch_add(1, Ordering::Relaxed);
    ::metrics::counter!("backend_requests_received_total").increment(1);

    if let Some(reply) = state.cache.get(&request.id) {
        state.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(request_id = %request.id, "Replaying cached reply");
        return Json(reply).into_response();
    }

    let fail_rate = state.config.fail_rate;
    if fail_rate > 0.0 && rand::random::<f64>() < fail_rate {
        state.counters.failed.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("backend_requests_failed_total", "reason" => "fail_injection").increment(1);
        tracing::debug!(request_id = %request.id, "Injected failure");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(X_STATUS, "RESOURCE_EXHAUSTED")],
            "rate limited",
        )
            .into_response();
    }

    let _worker = if state.config.single_worker {
        Some(state.worker.lock().await)
    } else {
        None
    };
    ::metrics::histogram!("backend_queue_wait_ms").record(started.elapsed().as_secs_f64() * 1000.0);

    tokio::time::sleep(state.config.delay).await;

    let reply = WorkReply::success();
    state.cache.insert(&request.id, reply.clone());
    state.counters.completed.fetch_add(1, Ordering::Relaxed);
    ::metrics::histogram!("backend_request_latency_ms").record(started.elapsed().as_secs_f64() * 1000.0);
    Json(reply).into_response()
}

pub async fn health(State(state): State<BackendState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "serving",
        received: state.counters.received.load(Ordering::Relaxed),
        completed: state.counters.completed.load(Ordering::Relaxed),
        failed: state.counters.failed.load(Ordering::Relaxed),
    })
}
