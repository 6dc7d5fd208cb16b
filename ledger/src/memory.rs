//! In-process ledger backend.
//!
//! Units hold the whole ledger lock for their lifetime, so units run one at a
//! time. Writes are staged inside the unit and applied on commit.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use fxwallet_common::{Currency, TransactionId, UserId};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::account::{User, Wallet};
use crate::error::{LedgerError, LedgerResult};
use crate::journal::{NewTransaction, Transaction, TransactionQuery};
use crate::repository::{LedgerStore, LedgerUnit};

#[derive(Debug, Default)]
struct LedgerState {
    users: BTreeMap<UserId, User>,
    wallets: BTreeMap<(UserId, Currency), Wallet>,
    transactions: Vec<Transaction>,
    last_transaction_id: i64,
}

/// Ledger kept in memory. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger with pre-registered users.
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let state = LedgerState {
            users: users.into_iter().map(|u| (u.id, u)).collect(),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Number of committed transactions.
    pub async fn transaction_count(&self) -> usize {
        self.state.lock().await.transactions.len()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    fn name(&self) -> &str {
        "memory"
    }

    async fn begin(&self) -> LedgerResult<Box<dyn LedgerUnit>> {
        let guard = self.state.clone().lock_owned().await;
        let next_transaction_id = guard.last_transaction_id;
        Ok(Box::new(MemoryUnit {
            guard,
            users: Vec::new(),
            wallets: BTreeMap::new(),
            transactions: Vec::new(),
            last_transaction_id: next_transaction_id,
        }))
    }
}

struct MemoryUnit {
    guard: OwnedMutexGuard<LedgerState>,
    users: Vec<User>,
    wallets: BTreeMap<(UserId, Currency), Wallet>,
    transactions: Vec<Transaction>,
    last_transaction_id: i64,
}

impl MemoryUnit {
    fn wallet(&self, user_id: UserId, currency: Currency) -> Option<&Wallet> {
        let key = (user_id, currency);
        self.wallets
            .get(&key)
            .or_else(|| self.guard.wallets.get(&key))
    }
}

#[async_trait]
impl LedgerUnit for MemoryUnit {
    async fn user_exists(&mut self, user_id: UserId) -> LedgerResult<bool> {
        Ok(self.guard.users.contains_key(&user_id) || self.users.iter().any(|u| u.id == user_id))
    }

    async fn create_user(&mut self, user: &User) -> LedgerResult<bool> {
        if self.user_exists(user.id).await? {
            return Ok(false);
        }
        self.users.push(user.clone());
        Ok(true)
    }

    async fn get_wallet(
        &mut self,
        user_id: UserId,
        currency: Currency,
    ) -> LedgerResult<Option<Wallet>> {
        Ok(self.wallet(user_id, currency).cloned())
    }

    async fn get_or_create_wallet(
        &mut self,
        user_id: UserId,
        currency: Currency,
    ) -> LedgerResult<Wallet> {
        if let Some(wallet) = self.wallet(user_id, currency) {
            return Ok(wallet.clone());
        }

        debug!(user_id = %user_id, currency = %currency, "Creating wallet");
        let wallet = Wallet::empty(user_id, currency);
        self.wallets.insert((user_id, currency), wallet.clone());
        Ok(wallet)
    }

    async fn update_balance(
        &mut self,
        user_id: UserId,
        currency: Currency,
        balance: Decimal,
    ) -> LedgerResult<Wallet> {
        if balance < Decimal::ZERO {
            return Err(LedgerError::NegativeBalance {
                user_id,
                currency,
                balance,
            });
        }

        let mut wallet = self
            .wallet(user_id, currency)
            .cloned()
            .ok_or(LedgerError::WalletMissing { user_id, currency })?;

        let mut balance = balance;
        balance.rescale(currency.decimal_places());
        wallet.balance = balance;
        self.wallets.insert((user_id, currency), wallet.clone());
        Ok(wallet)
    }

    async fn list_wallets(&mut self, user_id: UserId) -> LedgerResult<Vec<Wallet>> {
        Ok(Currency::ALL
            .iter()
            .filter_map(|currency| self.wallet(user_id, *currency).cloned())
            .collect())
    }

    async fn create_transaction(&mut self, tx: NewTransaction) -> LedgerResult<Transaction> {
        self.last_transaction_id += 1;

        // Timestamps never run backwards against ids, even if the clock does.
        let previous = self
            .transactions
            .last()
            .or_else(|| self.guard.transactions.last())
            .map(|last| last.created_at);
        let now = Utc::now();
        let created_at = previous.map_or(now, |previous| previous.max(now));

        let transaction = Transaction {
            id: TransactionId::new(self.last_transaction_id),
            user_id: tx.user_id,
            kind: tx.kind,
            created_at,
        };
        self.transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn list_transactions(
        &mut self,
        user_id: UserId,
        query: TransactionQuery,
    ) -> LedgerResult<Vec<Transaction>> {
        // Stored in id order, so newest first is a reverse walk.
        Ok(self
            .guard
            .transactions
            .iter()
            .chain(self.transactions.iter())
            .rev()
            .filter(|tx| tx.user_id == user_id && query.matches(tx))
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        let MemoryUnit {
            mut guard,
            users,
            wallets,
            transactions,
            last_transaction_id,
        } = *self;

        let state = &mut *guard;
        for user in users {
            state.users.insert(user.id, user);
        }
        state.wallets.extend(wallets);
        state.transactions.extend(transactions);
        state.last_transaction_id = last_transaction_id;
        Ok(())
    }
}
