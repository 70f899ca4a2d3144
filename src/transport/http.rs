//! HTTP/2 transport with keepalive probing.
//!
//! # Responsibilities
//! - Own one independent HTTP/2 connection (one hyper client) per pool slot
//! - Probe liveness with HTTP/2 PING frames, including while idle
//! - Map HTTP responses onto canonical status codes
//!
//! # Design Decisions
//! - Prior-knowledge HTTP/2 (h2c); every call multiplexes over the slot's connection
//! - A dead connection is detected by the keepalive timeout, not by OS TCP timers
//! - The `x-status` response header carries the canonical status name; the HTTP status
//!   is the fallback when it is absent
//! - `close()` drops the client so the connection is released deterministically

use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use axum::body::Body;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use url::Url;

use crate::caller::RequestContext;
use crate::config::PoolConfig;
use crate::transport::{StatusCode, Transport, TransportError, WorkReply};

/// Header carrying the canonical status name of a reply.
pub const X_STATUS: &str = "x-status";
/// Header carrying the per-attempt deadline in milliseconds.
pub const X_DEADLINE_MS: &str = "x-deadline-ms";
/// Header carrying the logical request id (stable across retries).
pub const X_REQUEST_ID: &str = "x-request-id";

const MAX_REPLY_BYTES: usize = 64 * 1024;

/// One pooled HTTP/2 channel to the downstream.
#[derive(Debug)]
pub struct HttpChannel {
    slot: usize,
    work_uri: Uri,
    client: ArcSwapOption<Client<HttpConnector, Body>>,
}

impl HttpChannel {
    /// Build a channel for `target` with the pool's keepalive settings.
    pub fn connect(target: &Url, config: &PoolConfig, slot: usize) -> Result<Self, TransportError> {
        let work_uri: Uri = format!("{}/work", target.as_str().trim_end_matches('/'))
            .parse()
            .map_err(|e| TransportError::Connect(format!("invalid target {}: {}", target, e)))?;

        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);
        connector.set_connect_timeout(Some(Duration::from_millis(config.connect_timeout_ms)));

        let client = Client::builder(TokioExecutor::new())
            .http2_only(true)
            .timer(TokioTimer::new())
            .http2_keep_alive_interval(Duration::from_secs(config.keepalive_interval_secs))
            .http2_keep_alive_timeout(Duration::from_secs(config.keepalive_timeout_secs))
            .http2_keep_alive_while_idle(config.keepalive_while_idle)
            .build(connector);

        tracing::debug!(
            slot,
            uri = %work_uri,
            keepalive_interval_secs = config.keepalive_interval_secs,
            keepalive_timeout_secs = config.keepalive_timeout_secs,
            keepalive_while_idle = config.keepalive_while_idle,
            "HTTP/2 channel configured"
        );

        Ok(Self {
            slot,
            work_uri,
            client: ArcSwapOption::from_pointee(client),
        })
    }

    /// Pool slot this channel occupies.
    pub fn slot(&self) -> usize {
        self.slot
    }

    fn build_request(&self, ctx: &RequestContext) -> Result<Request<Body>, TransportError> {
        let body = serde_json::json!({ "id": ctx.request_id }).to_string();
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(self.work_uri.clone())
            .header(CONTENT_TYPE, "application/json");

        if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
            builder = builder.header(X_REQUEST_ID, value);
        }
        if let Some(deadline) = ctx.deadline {
            builder = builder.header(X_DEADLINE_MS, deadline.as_millis().to_string());
        }

        builder
            .body(Body::from(body))
            .map_err(|e| TransportError::InvalidReply(format!("failed to build request: {}", e)))
    }
}

#[async_trait]
impl Transport for HttpChannel {
    async fn invoke(&self, ctx: &RequestContext) -> Result<WorkReply, TransportError> {
        let Some(client) = self.client.load_full() else {
            return Err(TransportError::Closed);
        };

        let request = self.build_request(ctx)?;
        let response = client.request(request).await.map_err(|e| {
            if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else {
                TransportError::ConnectionReset(e.to_string())
            }
        })?;

        let http_status = response.status();
        let code = response
            .headers()
            .get(X_STATUS)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<StatusCode>().ok())
            .unwrap_or_else(|| StatusCode::from_http(http_status));

        let bytes = axum::body::to_bytes(Body::new(response.into_body()), MAX_REPLY_BYTES)
            .await
            .map_err(|e| TransportError::ConnectionReset(format!("reply body: {}", e)))?;

        if code != StatusCode::Ok {
            let message = String::from_utf8_lossy(&bytes).into_owned();
            tracing::debug!(
                slot = self.slot,
                request_id = %ctx.request_id,
                status = %http_status,
                code = %code,
                "Downstream returned failure status"
            );
            return Err(TransportError::Status { code, message });
        }

        serde_json::from_slice::<WorkReply>(&bytes)
            .map_err(|e| TransportError::InvalidReply(e.to_string()))
    }

    async fn close(&self) {
        if self.client.swap(None).is_some() {
            tracing::debug!(slot = self.slot, "HTTP/2 channel closed");
        }
    }
}
