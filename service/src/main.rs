//! fxwallet Binary
//!
//! Runs the wallet node and exposes wallet operations as subcommands.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fxwallet_common::{Currency, UserId, WalletError};
use fxwallet_ledger::{PgLedger, TransactionType};
use fxwallet_service::{seed_demo_data, WalletConfig, WalletNode};

/// fxwallet CLI
#[derive(Parser, Debug)]
#[command(name = "fxwallet")]
#[command(about = "Multi-currency USD/MXN wallet ledger")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply database migrations
    Migrate,
    /// Create demo users and balances
    Seed,
    /// Run the node and keep rates fresh until Ctrl+C
    Run,
    /// Add money to a wallet
    Fund {
        user_id: UserId,
        currency: Currency,
        amount: Decimal,
    },
    /// Take money out of a wallet
    Withdraw {
        user_id: UserId,
        currency: Currency,
        amount: Decimal,
    },
    /// Convert between a user's wallets at the current rate
    Convert {
        user_id: UserId,
        from: Currency,
        to: Currency,
        amount: Decimal,
    },
    /// Show a user's balances
    Balances { user_id: UserId },
    /// Show a user's transaction history, newest first
    Transactions {
        user_id: UserId,
        /// Maximum number of records
        #[arg(long)]
        limit: Option<usize>,
        /// Only show one type (fund, withdraw, convert)
        #[arg(long)]
        kind: Option<TransactionType>,
    },
    /// Show the rates currently in effect
    Rates,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .or_else(|_| std::env::var("LOG_LEVEL"))
                .unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = WalletConfig::from_env();
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let ledger = PgLedger::connect(&config.database.url, config.database.max_connections).await?;

    if let Command::Migrate = cli.command {
        ledger.migrate().await?;
        return Ok(ExitCode::SUCCESS);
    }

    let node = Arc::new(WalletNode::new(&config, Arc::new(ledger))?);
    let engine = node.engine().clone();

    let code = match cli.command {
        Command::Migrate => ExitCode::SUCCESS,
        Command::Seed => emit(seed_demo_data(&engine).await),
        Command::Run => {
            run(node).await;
            ExitCode::SUCCESS
        }
        Command::Fund {
            user_id,
            currency,
            amount,
        } => emit(engine.fund(user_id, currency, amount).await),
        Command::Withdraw {
            user_id,
            currency,
            amount,
        } => emit(engine.withdraw(user_id, currency, amount).await),
        Command::Convert {
            user_id,
            from,
            to,
            amount,
        } => {
            node.refresh_rates().await;
            emit(engine.convert(user_id, from, to, amount).await)
        }
        Command::Balances { user_id } => {
            let balances = engine.get_balances(user_id).await;
            emit(balances.map(|balances| json!({ "user_id": user_id, "balances": balances })))
        }
        Command::Transactions {
            user_id,
            limit,
            kind,
        } => match kind {
            Some(kind) => emit(engine.get_transactions_by_type(user_id, kind, limit).await),
            None => emit(engine.get_transactions(user_id, limit).await),
        },
        Command::Rates => emit(Ok(node.refresh_rates().await)),
    };

    Ok(code)
}

/// Run the node until Ctrl+C.
async fn run(node: Arc<WalletNode>) {
    let node_clone = node.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
        info!("Shutdown signal received");
        node_clone.stop().await;
    });

    node.start().await;

    // Keep running until shutdown
    while !node.state().is_terminal() {
        tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
    }

    let stats = node.updater().stats();
    info!(
        ticks_applied = stats.ticks_applied,
        ticks_skipped = stats.ticks_skipped,
        "Wallet node shutdown complete"
    );
}

/// Print a result as JSON. Errors print their code and fail the process.
fn emit<T: Serialize>(result: Result<T, WalletError>) -> ExitCode {
    match result {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(out) => {
                println!("{}", out);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "Failed to serialize output");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            println!(
                "{}",
                json!({
                    "error": e.error_code(),
                    "status": e.status_code(),
                    "message": e.public_message(),
                })
            );
            ExitCode::FAILURE
        }
    }
}
