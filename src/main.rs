//! resilient-caller load driver
//!
//! Fires a batch of concurrent "Work" calls through a `ResilientCaller` and prints a JSON
//! summary of outcomes and latencies.
//!
//! ```text
//!   CLI flags ─┐
//!   TOML file ─┴─▶ CallerConfig ─▶ ResilientCaller ─▶ ConnectionPool ─▶ work-backend
//!                                        │
//!                                        ├─▶ tracing (stdout)
//!                                        └─▶ metrics (Prometheus, optional)
//! ```
//!
//! Ctrl-C cancels in-flight calls; they are reported with code `CANCELLED`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;

use resilient_caller::config::validation::validate_config;
use resilient_caller::config::{load_config, CallerConfig, ConfigError, LayerConfig, Scenario};
use resilient_caller::lifecycle::{signals, Shutdown};
use resilient_caller::observability::logging::init_logging;
use resilient_caller::observability::metrics::{init_metrics, MetricsSink, NoopSink, PrometheusSink};
use resilient_caller::{CallResult, ResilientCaller};

#[derive(Parser, Debug)]
#[command(name = "resilient-caller")]
#[command(about = "Drive concurrent Work calls through the resilience pipeline", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target base URL, overrides `target.url`
    #[arg(short, long)]
    target: Option<String>,

    /// Layer preset: baseline, retry or resilient
    #[arg(short, long)]
    scenario: Option<Scenario>,

    /// Number of logical calls to make
    #[arg(short = 'n', long, default_value_t = 100)]
    requests: usize,

    /// Calls in flight at once
    #[arg(short = 'c', long, default_value_t = 10)]
    concurrency: usize,

    /// Connections in the pool, overrides `pool.size`
    #[arg(long)]
    pool_size: Option<usize>,
}

#[derive(Debug, Serialize)]
struct LatencySummary {
    p50: u64,
    p95: u64,
    p99: u64,
    max: u64,
}

#[derive(Debug, Serialize)]
struct RunSummary {
    layers: LayerConfig,
    requests: usize,
    ok: usize,
    by_reason: BTreeMap<String, usize>,
    latency_ms: LatencySummary,
    breaker_state: String,
}

fn resolve_config(cli: &Cli) -> Result<CallerConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => CallerConfig::default(),
    };
    if let Some(target) = &cli.target {
        config.target.url = target.clone();
    }
    if let Some(scenario) = cli.scenario {
        config.layers = LayerConfig::for_scenario(scenario);
    }
    if let Some(size) = cli.pool_size {
        config.pool.size = size;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Nearest-rank percentile over sorted samples.
fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

fn summarize(layers: LayerConfig, results: &[CallResult], breaker_state: String) -> RunSummary {
    let mut by_reason = BTreeMap::new();
    for result in results {
        *by_reason.entry(result.code.clone()).or_insert(0) += 1;
    }
    let mut latencies: Vec<u64> = results.iter().map(|r| r.latency_ms).collect();
    latencies.sort_unstable();

    RunSummary {
        layers,
        requests: results.len(),
        ok: results.iter().filter(|r| r.ok).count(),
        by_reason,
        latency_ms: LatencySummary {
            p50: percentile(&latencies, 50.0),
            p95: percentile(&latencies, 95.0),
            p99: percentile(&latencies, 99.0),
            max: latencies.last().copied().unwrap_or(0),
        },
        breaker_state,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    init_logging(&config.observability.log_level);
    tracing::info!(
        target_url = %config.target.url,
        requests = cli.requests,
        concurrency = cli.concurrency,
        pool_size = config.pool.size,
        "resilient-caller v0.1.0 starting"
    );

    let sink: Arc<dyn MetricsSink> = if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
        Arc::new(PrometheusSink::new(config.target.service.clone()))
    } else {
        Arc::new(NoopSink)
    };

    let caller = Arc::new(ResilientCaller::from_config(&config, sink)?);
    let shutdown = Arc::new(Shutdown::new());
    let signal_task = signals::spawn_ctrl_c_handler(Arc::clone(&shutdown));

    let results: Vec<CallResult> = stream::iter(0..cli.requests)
        .map(|_| {
            let caller = Arc::clone(&caller);
            let cancel = shutdown.cancelled();
            async move {
                let request_id = uuid::Uuid::new_v4().to_string();
                caller.call_cancellable(&request_id, cancel).await
            }
        })
        .buffer_unordered(cli.concurrency.max(1))
        .collect()
        .await;

    signal_task.abort();
    let summary = summarize(config.layers, &results, caller.breaker().state().to_string());
    caller.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    tracing::info!("Run complete");
    Ok(())
}
