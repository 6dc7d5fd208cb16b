//! fxwallet Simulator
//!
//! Runs a random fund/withdraw/convert workload against an in-memory wallet
//! node and reports what happened.

use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fxwallet_fx::RateMode;
use fxwallet_service::WalletConfig;

mod controller;
mod metrics;
mod workload;

use controller::SimulationController;

/// fxwallet Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "fxwallet-simulator")]
#[command(about = "fxwallet workload simulator")]
struct Args {
    /// Number of simulated users
    #[arg(short, long, default_value = "3")]
    users: usize,

    /// Number of operations to run
    #[arg(short, long, default_value = "200")]
    operations: u64,

    /// FX rate mode (static, random, api)
    #[arg(long, default_value = "static")]
    mode: RateMode,

    /// Rate update interval in milliseconds
    #[arg(long, default_value = "1000")]
    interval_ms: u64,

    /// Pause between operations in milliseconds
    #[arg(long, default_value = "0")]
    delay_ms: u64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = WalletConfig::from_env();
    config.rates.mode = args.mode;
    config.rates.update_interval = Duration::from_millis(args.interval_ms);
    config.validate_users = true;
    if let Err(e) = config.validate() {
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    info!("Starting fxwallet Simulator");
    info!("Users: {}", args.users);
    info!("Rate mode: {}", args.mode);

    let mut controller = SimulationController::new(
        args.users,
        Duration::from_millis(args.delay_ms),
        args.seed,
        &config,
    )?;
    controller.initialize().await?;
    controller.run(args.operations).await?;
    controller.stop().await;

    let (usd, mxn) = controller.total_balances().await?;
    let rates = controller.node().engine().get_current_rates();
    let ticks = controller.node().updater().stats();

    // Print metrics
    let metrics = controller.get_metrics();
    info!("Simulation complete");
    info!("Total operations: {}", metrics.total_operations);
    info!("Successful: {}", metrics.successful_operations);
    info!("Failed: {}", metrics.failed_operations);
    for (code, count) in &metrics.failures_by_code {
        info!("  {}: {}", code, count);
    }
    info!("Success rate: {:.1}%", metrics.success_rate() * 100.0);
    info!(
        "Latency avg/p50/p99: {}/{}/{}us",
        metrics.average_latency_us(),
        metrics.p50_latency_us(),
        metrics.p99_latency_us()
    );
    info!("Total balances: {} USD, {} MXN", usd, mxn);
    info!(
        "Final rates: USD->MXN {}, MXN->USD {} ({} ticks applied, {} skipped)",
        rates.usd_to_mxn, rates.mxn_to_usd, ticks.ticks_applied, ticks.ticks_skipped
    );

    Ok(())
}
