//! CLI entry point (component L, ambient): loads config, wires the HTTP
//! transport into the price monitor and opportunity detector, starts the
//! poll loop, and runs until SIGINT/SIGTERM (§4.L).

use dexarb_core::config::load_config;
use dexarb_core::detector::OpportunityDetector;
use dexarb_core::gas::StaticGasEstimator;
use dexarb_core::monitor::PriceMonitor;
use dexarb_core::transport::http::HttpTransport;
use futures::stream::StreamExt;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = load_config()?;
    info!(pools = config.pools.len(), rpc_url = %config.rpc_url, "configuration loaded");

    let transport = Arc::new(HttpTransport::connect(&config.rpc_url)?);
    let gas_estimator = Arc::new(StaticGasEstimator::new(config.detector.gas_price_gwei, config.detector.gas_per_swap));

    let monitor = Arc::new(PriceMonitor::new(config.pools, transport, config.monitor));
    let detector = Arc::new(OpportunityDetector::new(config.detector, config.optimizer, gas_estimator));

    detector.attach(&monitor);
    monitor.start();
    info!("price monitor started");

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    signals.next().await;
    info!("shutdown signal received");

    monitor.stop().await;
    info!("price monitor stopped");

    Ok(())
}
