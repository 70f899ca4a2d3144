//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (sizes > 0, threshold within (0, 100])
//! - Check the target URL is usable by the HTTP/2 transport
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CallerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use url::Url;

use crate::config::schema::CallerConfig;

/// A single semantic violation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration, collecting every violation.
pub fn validate_config(config: &CallerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.target.url) {
        Ok(url) if url.scheme() != "http" => errors.push(ValidationError::new(
            "target.url",
            format!("unsupported scheme '{}', expected http", url.scheme()),
        )),
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::new("target.url", e.to_string())),
    }

    if config.deadline.deadline_ms == 0 {
        errors.push(ValidationError::new("deadline.deadline_ms", "must be greater than 0"));
    }
    if config.bulkhead.max_inflight == 0 {
        errors.push(ValidationError::new("bulkhead.max_inflight", "must be at least 1"));
    }
    if config.pool.size == 0 {
        errors.push(ValidationError::new("pool.size", "must be at least 1"));
    }
    if config.pool.keepalive_interval_secs == 0 {
        errors.push(ValidationError::new(
            "pool.keepalive_interval_secs",
            "must be greater than 0",
        ));
    }

    let cb = &config.circuit_breaker;
    if cb.sliding_window_size == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.sliding_window_size",
            "must be at least 1",
        ));
    }
    if !(cb.failure_rate_threshold > 0.0 && cb.failure_rate_threshold <= 100.0) {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_rate_threshold",
            format!("{} is outside (0, 100]", cb.failure_rate_threshold),
        ));
    }
    if cb.half_open_probe_count == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.half_open_probe_count",
            "must be at least 1",
        ));
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if !(retries.backoff_multiplier >= 1.0) {
        errors.push(ValidationError::new(
            "retries.backoff_multiplier",
            "must be at least 1.0",
        ));
    }
    if retries.initial_backoff_ms > retries.max_backoff_ms {
        errors.push(ValidationError::new(
            "retries.initial_backoff_ms",
            format!(
                "{} exceeds max_backoff_ms {}",
                retries.initial_backoff_ms, retries.max_backoff_ms
            ),
        ));
    }
    if !(0.0..=1.0).contains(&retries.jitter_ratio) {
        errors.push(ValidationError::new("retries.jitter_ratio", "must be within [0, 1]"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
