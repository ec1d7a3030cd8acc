use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bidstorm::api::{self, AppState};
use bidstorm::auction;
use bidstorm::config::SimulatorConfig;
use bidstorm::dispatcher::{Dispatch, Dispatcher};
use bidstorm::engine::{Engine, Generator};
use bidstorm::generator::RequestGenerator;
use bidstorm::scenarios;
use bidstorm::stats::StatsCollector;

#[derive(Parser, Debug)]
#[command(name = "bidstorm", about = "Synthetic OpenRTB 2.5 traffic simulator")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "bidstorm.toml")]
    config: PathBuf,
    /// Start the simulation immediately instead of waiting for POST /start.
    #[arg(long)]
    auto_start: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = SimulatorConfig::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;

    info!(
        port = config.server.port,
        rps = config.simulation.requests_per_second,
        scenario = %config.simulation.scenario,
        auction_type = %config.auction.kind,
        timeout_ms = config.auction.timeout_ms,
        dsps = config.dsps.len(),
        enabled = config.enabled_dsps().len(),
        "starting bidstorm"
    );
    for dsp in &config.dsps {
        info!(name = %dsp.name, url = %dsp.url, enabled = dsp.enabled, "configured dsp");
    }

    let timeout = Duration::from_millis(config.auction.timeout_ms);
    let generator: Arc<dyn Generator> = Arc::new(
        RequestGenerator::new(scenarios::by_name(&config.simulation.scenario))
            .with_tmax_ms(config.auction.timeout_ms as i64),
    );
    let dispatcher: Arc<dyn Dispatch> = Arc::new(Dispatcher::new(config.enabled_dsps(), timeout));
    let stats = Arc::new(StatsCollector::new());
    let engine = Arc::new(
        Engine::new(
            generator,
            dispatcher,
            auction::by_kind(&config.auction.kind),
            Arc::clone(&stats),
        )
        .with_rps(config.simulation.requests_per_second),
    );

    let config = Arc::new(config);
    let state = AppState {
        engine: Arc::clone(&engine),
        stats: Arc::clone(&stats),
        config: Arc::clone(&config),
    };

    let listener = TcpListener::bind(("0.0.0.0", config.server.port))
        .await
        .with_context(|| format!("binding control plane to port {}", config.server.port))?;
    info!(addr = %listener.local_addr()?, "control plane listening");

    if args.auto_start {
        engine.start().context("auto-starting simulation")?;
    } else {
        info!("simulation ready, POST /start to begin");
    }

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving control plane")?;

    if engine.is_running() {
        info!("stopping simulation");
        engine.stop().await;
    }

    let snap = stats.snapshot();
    info!(
        total_requests = snap.total_requests,
        total_bids = snap.total_bids,
        total_wins = snap.total_wins,
        total_no_bids = snap.total_no_bids,
        total_errors = snap.total_errors,
        total_revenue = %format!("{:.4}", snap.total_revenue),
        "final statistics"
    );

    Ok(())
}

async fn shutdown_signal() {
    // Serve until interrupted; an error installing the handler would mean
    // shutdown is impossible anyway, so treat it the same as a signal.
    let _ = tokio::signal::ctrl_c().await;
}
