//! Simulation controller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use tracing::{debug, info};

use fxwallet_common::{Currency, UserId, WalletError};
use fxwallet_ledger::{InMemoryLedger, LedgerStore, User};
use fxwallet_service::{WalletConfig, WalletNode};

use crate::metrics::SimulationMetrics;
use crate::workload::{Operation, WorkloadGenerator};

/// Opening balance per wallet.
const INITIAL_USD: i64 = 1_000;
const INITIAL_MXN: i64 = 20_000;

/// Drives a random workload against an in-memory wallet node.
pub struct SimulationController {
    /// Number of simulated users.
    user_count: usize,
    /// Pause between operations.
    delay: Duration,
    /// Operation source.
    workload: WorkloadGenerator,
    /// Ledger behind the node.
    ledger: InMemoryLedger,
    /// Node under test.
    node: WalletNode,
    /// Simulation metrics.
    metrics: SimulationMetrics,
}

impl SimulationController {
    /// Create a new simulation controller.
    pub fn new(
        user_count: usize,
        delay: Duration,
        seed: Option<u64>,
        config: &WalletConfig,
    ) -> anyhow::Result<Self> {
        let ledger = InMemoryLedger::new();
        let node = WalletNode::new(config, Arc::new(ledger.clone()))?;

        Ok(Self {
            user_count,
            delay,
            workload: WorkloadGenerator::new(user_count, seed),
            ledger,
            node,
            metrics: SimulationMetrics::new(),
        })
    }

    /// Register users, fund their wallets and start the node.
    pub async fn initialize(&mut self) -> anyhow::Result<()> {
        info!("Initializing simulation with {} users", self.user_count);

        let mut unit = self.ledger.begin().await?;
        for id in 1..=self.user_count as i64 {
            let user = User::new(
                UserId::new(id),
                format!("user{}@sim.local", id),
                format!("Sim User {}", id),
            );
            unit.create_user(&user).await?;
        }
        unit.commit().await?;

        let engine = self.node.engine();
        for id in 1..=self.user_count as i64 {
            let user_id = UserId::new(id);
            engine
                .fund(user_id, Currency::Usd, Decimal::from(INITIAL_USD))
                .await?;
            engine
                .fund(user_id, Currency::Mxn, Decimal::from(INITIAL_MXN))
                .await?;
        }

        self.node.start().await;
        Ok(())
    }

    /// Run `operations` random operations.
    pub async fn run(&mut self, operations: u64) -> anyhow::Result<()> {
        info!("Running {} operations", operations);

        for _ in 0..operations {
            let operation = self.workload.next_operation();
            let started = Instant::now();
            let result = self.execute(operation).await;
            let latency = started.elapsed().as_micros() as u64;

            match result {
                Ok(()) => self.metrics.record_success(latency),
                Err(e) => {
                    debug!(
                        kind = operation.name(),
                        operation = %operation,
                        code = e.error_code(),
                        "Operation failed"
                    );
                    self.metrics.record_failure(e.error_code(), latency);
                }
            }

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        Ok(())
    }

    async fn execute(&self, operation: Operation) -> Result<(), WalletError> {
        let engine = self.node.engine();
        match operation {
            Operation::Fund {
                user_id,
                currency,
                amount,
            } => engine.fund(user_id, currency, amount).await.map(|_| ()),
            Operation::Withdraw {
                user_id,
                currency,
                amount,
            } => engine.withdraw(user_id, currency, amount).await.map(|_| ()),
            Operation::Convert {
                user_id,
                from,
                to,
                amount,
            } => engine.convert(user_id, from, to, amount).await.map(|_| ()),
        }
    }

    /// Sum of all balances per currency.
    pub async fn total_balances(&self) -> anyhow::Result<(Decimal, Decimal)> {
        let mut usd = Decimal::ZERO;
        let mut mxn = Decimal::ZERO;

        for id in 1..=self.user_count as i64 {
            let balances = self.node.engine().get_balances(UserId::new(id)).await?;
            usd += balances.get(&Currency::Usd).copied().unwrap_or_default();
            mxn += balances.get(&Currency::Mxn).copied().unwrap_or_default();
        }

        Ok((usd, mxn))
    }

    /// Stop the node.
    pub async fn stop(&self) {
        self.node.stop().await;
    }

    /// Get simulation metrics.
    pub fn get_metrics(&self) -> &SimulationMetrics {
        &self.metrics
    }

    /// Get the node under simulation.
    pub fn node(&self) -> &WalletNode {
        &self.node
    }
}
