//! Wallet node lifecycle.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, instrument, warn};

use fxwallet_fx::{FxResult, RateSnapshot, RateStore, RateUpdater, TickOutcome};
use fxwallet_ledger::LedgerStore;

use crate::config::WalletConfig;
use crate::engine::WalletEngine;

/// Node operational state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Built, rate updater not started yet.
    Starting,
    /// Serving operations with the updater scheduled.
    Running,
    /// Stop requested.
    ShuttingDown,
    /// Updater stopped.
    Stopped,
}

impl NodeState {
    /// Check if the node is accepting requests.
    pub fn accepts_requests(&self) -> bool {
        matches!(self, NodeState::Running)
    }

    /// Check if the node is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeState::Stopped)
    }
}

/// Owns the rate store, its updater and the engine reading from it.
pub struct WalletNode {
    rates: Arc<RateStore>,
    updater: RateUpdater,
    engine: Arc<WalletEngine>,
    state: RwLock<NodeState>,
}

impl WalletNode {
    /// Wire a node from configuration.
    pub fn new(config: &WalletConfig, ledger: Arc<dyn LedgerStore>) -> FxResult<Self> {
        let rates = Arc::new(RateStore::new(config.initial_snapshot()?));
        let updater = RateUpdater::from_config(&config.updater_config(), rates.clone())?;
        Ok(Self::with_updater(rates, updater, ledger, config))
    }

    /// Wire a node around an already-built updater.
    pub fn with_updater(
        rates: Arc<RateStore>,
        updater: RateUpdater,
        ledger: Arc<dyn LedgerStore>,
        config: &WalletConfig,
    ) -> Self {
        let engine = Arc::new(WalletEngine::new(
            ledger,
            rates.clone(),
            config.engine_config(),
        ));

        Self {
            rates,
            updater,
            engine,
            state: RwLock::new(NodeState::Starting),
        }
    }

    /// Start the rate updater.
    ///
    /// Only a node that has not started yet moves to `Running`; a stop that
    /// lands while the updater starts wins.
    #[instrument(skip(self))]
    pub async fn start(&self) {
        if self.state() != NodeState::Starting {
            warn!(state = ?self.state(), "Wallet node already started or stopped");
            return;
        }
        info!(mode = %self.updater.mode(), "Starting wallet node");

        let scheduled = self.updater.start().await;
        let stopped = {
            let mut state = self.state.write();
            if *state == NodeState::Starting {
                *state = NodeState::Running;
                false
            } else {
                true
            }
        };
        if stopped {
            self.updater.stop().await;
            warn!("Wallet node stopped while starting");
            return;
        }

        let rates = self.rates.get_rates();
        info!(
            scheduled,
            usd_to_mxn = %rates.usd_to_mxn,
            mxn_to_usd = %rates.mxn_to_usd,
            "Wallet node started"
        );
    }

    /// Stop the rate updater.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        info!("Stopping wallet node");
        *self.state.write() = NodeState::ShuttingDown;

        self.updater.stop().await;

        *self.state.write() = NodeState::Stopped;
        info!("Wallet node stopped");
    }

    /// Fetch a fresh rate once, outside the schedule.
    ///
    /// Static nodes keep their configured snapshot.
    pub async fn refresh_rates(&self) -> RateSnapshot {
        if self.updater.mode().is_dynamic() {
            if let TickOutcome::Applied(snapshot) = self.updater.tick().await {
                return snapshot;
            }
        }
        self.rates.get_rates()
    }

    /// Check if the node is accepting requests.
    pub fn is_running(&self) -> bool {
        self.state.read().accepts_requests()
    }

    /// Get the current node state.
    pub fn state(&self) -> NodeState {
        *self.state.read()
    }

    /// Get the wallet engine.
    pub fn engine(&self) -> &Arc<WalletEngine> {
        &self.engine
    }

    /// Get the shared rate store.
    pub fn rates(&self) -> &Arc<RateStore> {
        &self.rates
    }

    /// Get the rate updater.
    pub fn updater(&self) -> &RateUpdater {
        &self.updater
    }
}
