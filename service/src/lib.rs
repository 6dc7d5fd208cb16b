//! fxwallet Service
//!
//! The wallet operations engine and the node that wires it to the ledger
//! and the FX rate updater. Every operation (fund, withdraw, convert) is
//! atomic: balance changes and the transaction record commit together or
//! not at all.

pub mod config;
pub mod engine;
pub mod metrics;
pub mod node;
pub mod seed;

pub use config::WalletConfig;
pub use engine::{
    ConvertReceipt, EngineConfig, FundReceipt, TransactionHistory, WalletEngine,
    WithdrawReceipt, DEFAULT_HISTORY_LIMIT,
};
pub use metrics::{Metrics, MetricsSnapshot, SharedMetrics};
pub use node::{NodeState, WalletNode};
pub use seed::{seed_demo_data, SeedReport};
