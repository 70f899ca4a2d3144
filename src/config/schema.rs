//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the caller.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the resilient caller.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CallerConfig {
    /// Downstream target.
    pub target: TargetConfig,

    /// Which protection layers are enabled.
    pub layers: LayerConfig,

    /// Per-attempt deadline.
    pub deadline: DeadlineConfig,

    /// Concurrency bulkhead.
    pub bulkhead: BulkheadConfig,

    /// Connection pool and keepalive.
    pub pool: PoolConfig,

    /// Circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Downstream target configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Base URL of the Work service (e.g., "http://127.0.0.1:50051").
    pub url: String,

    /// Method label used in metrics.
    pub method: String,

    /// Service label used in metrics.
    pub service: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:50051".to_string(),
            method: "Work".to_string(),
            service: "work-backend".to_string(),
        }
    }
}

/// Named presets of enabled layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// No protection at all.
    Baseline,
    /// Gated retry only.
    Retry,
    /// Breaker, bulkhead, deadline and retry.
    #[default]
    Resilient,
}

impl std::str::FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "baseline" => Ok(Scenario::Baseline),
            "retry" => Ok(Scenario::Retry),
            "resilient" => Ok(Scenario::Resilient),
            other => Err(format!("unknown scenario: {}", other)),
        }
    }
}

/// Capability set of protection layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LayerConfig {
    pub circuit_breaker: bool,
    pub bulkhead: bool,
    pub deadline: bool,
    pub retry: bool,
}

impl LayerConfig {
    /// Layers enabled by a named scenario.
    pub fn for_scenario(scenario: Scenario) -> Self {
        match scenario {
            Scenario::Baseline => Self {
                circuit_breaker: false,
                bulkhead: false,
                deadline: false,
                retry: false,
            },
            Scenario::Retry => Self {
                circuit_breaker: false,
                bulkhead: false,
                deadline: false,
                retry: true,
            },
            Scenario::Resilient => Self {
                circuit_breaker: true,
                bulkhead: true,
                deadline: true,
                retry: true,
            },
        }
    }
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self::for_scenario(Scenario::Resilient)
    }
}

/// Deadline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeadlineConfig {
    /// Per-attempt deadline in milliseconds.
    pub deadline_ms: u64,
}

impl DeadlineConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self { deadline_ms: 800 }
    }
}

/// Bulkhead configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BulkheadConfig {
    /// Maximum concurrent in-flight logical calls.
    pub max_inflight: usize,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self { max_inflight: 10 }
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of independent connections.
    pub size: usize,

    /// Interval between keepalive pings in seconds.
    pub keepalive_interval_secs: u64,

    /// Time to wait for a ping ack before declaring the connection dead.
    pub keepalive_timeout_secs: u64,

    /// Keep pinging while no calls are in flight.
    pub keepalive_while_idle: bool,

    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 1,
            keepalive_interval_secs: 30,
            keepalive_timeout_secs: 10,
            keepalive_while_idle: true,
            connect_timeout_ms: 1000,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of most recent results considered (count-based window).
    pub sliding_window_size: usize,

    /// Failure percentage at or above which the breaker opens.
    pub failure_rate_threshold: f64,

    /// Seconds the breaker stays open before probing.
    pub open_state_wait_secs: u64,

    /// Number of probe calls permitted while half-open.
    pub half_open_probe_count: usize,
}

impl CircuitBreakerConfig {
    pub fn open_state_wait(&self) -> Duration {
        Duration::from_secs(self.open_state_wait_secs)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            sliding_window_size: 10,
            failure_rate_threshold: 50.0,
            open_state_wait_secs: 5,
            half_open_probe_count: 3,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts per logical call, including the first.
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds.
    pub initial_backoff_ms: u64,

    /// Factor applied to the delay after each retry.
    pub backoff_multiplier: f64,

    /// Upper bound on any single delay in milliseconds.
    pub max_backoff_ms: u64,

    /// Random extra delay as a fraction of the computed delay (0.0 disables jitter).
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 50,
            backoff_multiplier: 2.0,
            max_backoff_ms: 500,
            jitter_ratio: 0.0,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
