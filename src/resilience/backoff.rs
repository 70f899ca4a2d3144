//! Exponential backoff with optional jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Calculate the delay before retry number `attempt` (1-based).
///
/// `attempt == 1` yields `initial_ms`; each later attempt multiplies by `multiplier`,
/// capped at `max_ms`. A non-zero `jitter_ratio` adds up to that fraction of the delay.
pub fn calculate_backoff(
    attempt: u32,
    initial_ms: u64,
    multiplier: f64,
    max_ms: u64,
    jitter_ratio: f64,
) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let delay_ms = (initial_ms as f64) * multiplier.powi(exponent);
    let capped_delay = if delay_ms.is_finite() {
        (delay_ms as u64).min(max_ms)
    } else {
        max_ms
    };

    let jitter_range = (capped_delay as f64 * jitter_ratio) as u64;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Backoff for retry number `attempt` using a `RetryConfig`.
pub fn backoff_for(config: &RetryConfig, attempt: u32) -> Duration {
    calculate_backoff(
        attempt,
        config.initial_backoff_ms,
        config.backoff_multiplier,
        config.max_backoff_ms,
        config.jitter_ratio,
    )
}
