//! Storage traits for wallets and transactions.
//!
//! Every wallet operation runs inside one [`LedgerUnit`]. Writes made through a
//! unit become visible only after [`LedgerUnit::commit`]; dropping a unit
//! without committing discards them.

use async_trait::async_trait;
use fxwallet_common::{Currency, UserId};
use rust_decimal::Decimal;

use crate::account::{User, Wallet};
use crate::error::LedgerResult;
use crate::journal::{NewTransaction, Transaction, TransactionQuery};

/// Entry point to a ledger backend.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Get backend name.
    fn name(&self) -> &str;

    /// Open a unit of work.
    ///
    /// Units that touch the same wallets are serialized: a second unit
    /// reading a wallet waits until the first commits or is dropped.
    async fn begin(&self) -> LedgerResult<Box<dyn LedgerUnit>>;
}

/// Reads and writes scoped to one atomic unit of work.
#[async_trait]
pub trait LedgerUnit: Send {
    /// Check whether a user is registered.
    async fn user_exists(&mut self, user_id: UserId) -> LedgerResult<bool>;

    /// Register a user. Returns false if the id was already taken.
    async fn create_user(&mut self, user: &User) -> LedgerResult<bool>;

    /// Get a wallet, locking it for the rest of the unit.
    async fn get_wallet(
        &mut self,
        user_id: UserId,
        currency: Currency,
    ) -> LedgerResult<Option<Wallet>>;

    /// Get a wallet, creating it with a zero balance if missing.
    async fn get_or_create_wallet(
        &mut self,
        user_id: UserId,
        currency: Currency,
    ) -> LedgerResult<Wallet>;

    /// Overwrite a wallet balance.
    async fn update_balance(
        &mut self,
        user_id: UserId,
        currency: Currency,
        balance: Decimal,
    ) -> LedgerResult<Wallet>;

    /// List all wallets a user owns.
    async fn list_wallets(&mut self, user_id: UserId) -> LedgerResult<Vec<Wallet>>;

    /// Append a transaction record.
    async fn create_transaction(&mut self, tx: NewTransaction) -> LedgerResult<Transaction>;

    /// List a user's transactions, newest first.
    async fn list_transactions(
        &mut self,
        user_id: UserId,
        query: TransactionQuery,
    ) -> LedgerResult<Vec<Transaction>>;

    /// Make all writes of this unit durable and visible.
    async fn commit(self: Box<Self>) -> LedgerResult<()>;
}
