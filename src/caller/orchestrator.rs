//! The resilient call pipeline.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use thiserror::Error;
use tokio::time::Instant;
use url::Url;

use crate::caller::{CallResult, RequestContext};
use crate::config::{CallerConfig, LayerConfig, RetryConfig};
use crate::observability::metrics::{BreakerStateReporter, MetricsSink};
use crate::pool::connection::ConnectionHandle;
use crate::pool::ConnectionPool;
use crate::resilience::backoff::backoff_for;
use crate::resilience::timeouts::with_deadline;
use crate::resilience::{
    Bulkhead, CallOutcome, CircuitBreaker, CircuitState, ErrorClassifier, ErrorReason,
    ProtectionEvent, RetryDecisionPolicy,
};
use crate::transport::{TransportError, WorkReply};

/// Which protection layers a caller applies.
pub type LayerSet = LayerConfig;

/// Errors raised while building a caller.
#[derive(Debug, Error)]
pub enum CallerError {
    #[error("invalid target url: {0}")]
    InvalidTarget(#[from] url::ParseError),

    #[error("failed to build connection pool: {0}")]
    Pool(#[from] TransportError),
}

/// Orchestrates breaker, bulkhead, deadline and retry around a pooled transport.
pub struct ResilientCaller {
    layers: LayerSet,
    method: String,
    deadline: Duration,
    retries: RetryConfig,
    policy: RetryDecisionPolicy,
    breaker: Arc<CircuitBreaker>,
    bulkhead: Arc<Bulkhead>,
    pool: ConnectionPool,
    metrics: Arc<dyn MetricsSink>,
}

impl ResilientCaller {
    /// Build a caller over an existing pool.
    pub fn new(config: &CallerConfig, pool: ConnectionPool, metrics: Arc<dyn MetricsSink>) -> Self {
        let breaker = CircuitBreaker::new(config.target.service.clone(), &config.circuit_breaker)
            .with_listener(Arc::new(BreakerStateReporter::new(Arc::clone(&metrics))));

        metrics.set_breaker_state(CircuitState::Closed.code());
        metrics.set_pool_size(pool.len());
        metrics.set_inflight(0);

        tracing::info!(
            service = %config.target.service,
            pool_size = pool.len(),
            circuit_breaker = config.layers.circuit_breaker,
            bulkhead = config.layers.bulkhead,
            deadline = config.layers.deadline,
            retry = config.layers.retry,
            "Resilient caller initialized"
        );

        Self {
            layers: config.layers,
            method: config.target.method.clone(),
            deadline: config.deadline.deadline(),
            retries: config.retries.clone(),
            policy: RetryDecisionPolicy::new(ErrorClassifier::new()),
            breaker: Arc::new(breaker),
            bulkhead: Arc::new(Bulkhead::new(config.bulkhead.max_inflight)),
            pool,
            metrics,
        }
    }

    /// Build a caller with an HTTP/2 pool to `config.target.url`.
    pub fn from_config(
        config: &CallerConfig,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, CallerError> {
        let target = Url::parse(&config.target.url)?;
        let pool = ConnectionPool::http(&target, &config.pool)?;
        Ok(Self::new(config, pool, metrics))
    }

    pub fn layers(&self) -> LayerSet {
        self.layers
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn bulkhead(&self) -> &Arc<Bulkhead> {
        &self.bulkhead
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Perform one logical call.
    pub async fn call(&self, request_id: &str) -> CallResult {
        self.call_cancellable(request_id, std::future::pending::<()>())
            .await
    }

    /// Perform one logical call, abandoning it as soon as `cancel` resolves.
    ///
    /// A cancelled call releases its permits without counting a breaker result.
    pub async fn call_cancellable<C>(&self, request_id: &str, cancel: C) -> CallResult
    where
        C: Future<Output = ()>,
    {
        let started = Instant::now();

        let breaker_permit = if self.layers.circuit_breaker {
            match self.breaker.acquire() {
                Some(permit) => Some(permit),
                None => return self.reject(request_id, ProtectionEvent::CircuitOpen),
            }
        } else {
            None
        };

        let bulkhead_permit = if self.layers.bulkhead {
            match self.bulkhead.try_acquire_permit() {
                Some(permit) => Some(permit),
                None => {
                    drop(breaker_permit);
                    return self.reject(request_id, ProtectionEvent::BulkheadRejected);
                }
            }
        } else {
            None
        };
        self.metrics.set_inflight(self.bulkhead.in_flight());

        let connection = self.pool.select();
        let ctx = RequestContext::new(request_id, self.layers.deadline.then_some(self.deadline));
        tracing::debug!(request_id, slot = connection.slot(), "Dispatching call");

        let mut attempts = 0u32;
        let settled = {
            let run = AssertUnwindSafe(self.run_attempts(&connection, &ctx, &mut attempts))
                .catch_unwind();
            tokio::select! {
                biased;
                _ = cancel => None,
                result = run => Some(result),
            }
        };
        let latency_ms = elapsed_ms(started);

        let (result, outcome) = match settled {
            Some(Ok(Ok(reply))) => {
                if let Some(permit) = breaker_permit {
                    permit.record(true);
                }
                (
                    CallResult::from_reply(reply, latency_ms, attempts),
                    CallOutcome::success(),
                )
            }
            Some(Ok(Err(outcome))) => {
                if let Some(permit) = breaker_permit {
                    permit.record(false);
                }
                (CallResult::failure(&outcome, latency_ms, attempts), outcome)
            }
            Some(Err(panic)) => {
                tracing::error!(
                    request_id,
                    attempts,
                    panic = panic_message(panic.as_ref()),
                    "Call aborted by internal fault"
                );
                if let Some(permit) = breaker_permit {
                    permit.record(false);
                }
                let outcome = CallOutcome::new(ErrorReason::Unknown, false, "INTERNAL_FAULT");
                (CallResult::failure(&outcome, latency_ms, attempts), outcome)
            }
            None => {
                tracing::warn!(request_id, attempts, latency_ms, "Call cancelled");
                drop(breaker_permit);
                (
                    CallResult::cancelled(latency_ms, attempts),
                    CallOutcome::new(ErrorReason::Unknown, false, "CANCELLED"),
                )
            }
        };

        drop(bulkhead_permit);
        self.metrics.set_inflight(self.bulkhead.in_flight());
        self.metrics.record_call(&self.method, latency_ms, &outcome);
        result
    }

    /// Close every pooled connection.
    pub async fn shutdown(&self) {
        self.pool.close().await;
        tracing::info!(breaker_state = %self.breaker.state(), "Resilient caller shut down");
    }

    async fn run_attempts(
        &self,
        connection: &ConnectionHandle,
        ctx: &RequestContext,
        attempts: &mut u32,
    ) -> Result<WorkReply, CallOutcome> {
        let max_attempts = if self.layers.retry {
            self.retries.max_attempts.max(1)
        } else {
            1
        };

        loop {
            *attempts += 1;
            let attempt = *attempts;

            let error = match with_deadline(ctx.deadline, connection.invoke(ctx)).await {
                Ok(reply) => return Ok(reply),
                Err(e) => e,
            };
            let outcome = self.policy.classifier().classify(Some(&error), None);

            if attempt >= max_attempts || !self.policy.should_retry(&outcome) {
                tracing::error!(
                    request_id = %ctx.request_id,
                    attempt,
                    reason = %outcome.reason,
                    detail = %outcome.detail,
                    error = %error,
                    "Call failed"
                );
                return Err(outcome);
            }

            let delay = backoff_for(&self.retries, attempt);
            tracing::info!(
                request_id = %ctx.request_id,
                attempt,
                delay = ?delay,
                reason = %outcome.reason,
                "Retrying call"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn reject(&self, request_id: &str, event: ProtectionEvent) -> CallResult {
        let outcome = self.policy.classifier().classify(None, Some(event));
        tracing::warn!(request_id, reason = %outcome.reason, "Call rejected");
        self.metrics.record_call(&self.method, 0, &outcome);
        CallResult::failure(&outcome, 0, 0)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
