//! Demo "Work" service used as the downstream of the resilient caller.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use resilient_caller::backend::{self, BackendConfig, BackendState};
use resilient_caller::observability::logging::init_logging;
use resilient_caller::observability::metrics::init_metrics;

#[derive(Parser, Debug)]
#[command(name = "work-backend")]
#[command(about = "Demo Work service with failure injection", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "127.0.0.1:50051")]
    bind: SocketAddr,

    /// Probability in [0, 1] of answering RESOURCE_EXHAUSTED
    #[arg(long, default_value_t = 0.0)]
    fail_rate: f64,

    /// Processing delay per call
    #[arg(long, default_value_t = 5)]
    delay_ms: u64,

    /// Lifetime of cached replies
    #[arg(long, default_value_t = 30)]
    cache_ttl_secs: u64,

    /// Process calls concurrently instead of through a single worker
    #[arg(long)]
    concurrent: bool,

    /// Expose Prometheus metrics on this address
    #[arg(long)]
    metrics_address: Option<SocketAddr>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if !(0.0..=1.0).contains(&cli.fail_rate) {
        return Err(format!("fail rate must be within [0, 1], got {}", cli.fail_rate).into());
    }
    if let Some(addr) = cli.metrics_address {
        init_metrics(addr);
    }

    let state = BackendState::new(BackendConfig {
        fail_rate: cli.fail_rate,
        delay: Duration::from_millis(cli.delay_ms),
        cache_ttl: Duration::from_secs(cli.cache_ttl_secs),
        single_worker: !cli.concurrent,
    });
    let purger = state.cache.spawn_purger(Duration::from_secs(30));

    let listener = TcpListener::bind(cli.bind).await?;
    backend::serve(listener, state).await?;

    purger.abort();
    tracing::info!("Shutdown complete");
    Ok(())
}
