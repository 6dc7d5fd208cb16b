//! Wallet operations engine.
//!
//! Each public operation runs in one ledger unit of work. Any early return
//! drops the unit, which discards every write it staged.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use fxwallet_common::{
    round_amount, validate_amount, Currency, Result, TransactionId, UserId, WalletError,
    MAX_AMOUNT,
};
use fxwallet_fx::{RateSnapshot, RateStore};
use fxwallet_ledger::{
    LedgerStore, LedgerUnit, NewTransaction, Transaction, TransactionQuery, TransactionType,
};

use crate::metrics::{Metrics, SharedMetrics};

/// Number of history records returned when the caller gives no limit.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Engine policy switches.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Reject users the ledger does not know.
    pub validate_users: bool,
    /// Upper bound on any wallet balance.
    pub max_balance: Option<Decimal>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validate_users: true,
            max_balance: None,
        }
    }
}

/// Result of a fund operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundReceipt {
    pub user_id: UserId,
    pub currency: Currency,
    pub amount: Decimal,
    pub new_balance: Decimal,
    pub transaction_id: TransactionId,
}

/// Result of a withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithdrawReceipt {
    pub user_id: UserId,
    pub currency: Currency,
    pub amount: Decimal,
    pub new_balance: Decimal,
    pub transaction_id: TransactionId,
}

/// Result of a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertReceipt {
    pub user_id: UserId,
    pub from_currency: Currency,
    pub to_currency: Currency,
    pub from_amount: Decimal,
    pub to_amount: Decimal,
    pub fx_rate: Decimal,
    pub transaction_id: TransactionId,
}

/// A page of a user's transaction history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionHistory {
    pub user_id: UserId,
    pub transactions: Vec<Transaction>,
    /// Number of records in `transactions`.
    pub total: usize,
}

/// Executes wallet operations against a ledger and the shared rate store.
pub struct WalletEngine {
    ledger: Arc<dyn LedgerStore>,
    rates: Arc<RateStore>,
    config: EngineConfig,
    metrics: SharedMetrics,
}

impl WalletEngine {
    /// Create a new engine.
    pub fn new(ledger: Arc<dyn LedgerStore>, rates: Arc<RateStore>, config: EngineConfig) -> Self {
        Self {
            ledger,
            rates,
            config,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Get the ledger this engine writes to.
    pub fn ledger(&self) -> &Arc<dyn LedgerStore> {
        &self.ledger
    }

    /// Get the engine's operation counters.
    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Add money to a wallet, creating the wallet if needed.
    #[instrument(skip(self))]
    pub async fn fund(
        &self,
        user_id: UserId,
        currency: Currency,
        amount: Decimal,
    ) -> Result<FundReceipt> {
        let result = self.apply_fund(user_id, currency, amount).await;
        self.record(&result, Metrics::fund_completed);
        result
    }

    /// Take money out of an existing wallet.
    #[instrument(skip(self))]
    pub async fn withdraw(
        &self,
        user_id: UserId,
        currency: Currency,
        amount: Decimal,
    ) -> Result<WithdrawReceipt> {
        let result = self.apply_withdraw(user_id, currency, amount).await;
        self.record(&result, Metrics::withdrawal_completed);
        result
    }

    /// Move money between a user's wallets at the current rate.
    #[instrument(skip(self))]
    pub async fn convert(
        &self,
        user_id: UserId,
        from_currency: Currency,
        to_currency: Currency,
        amount: Decimal,
    ) -> Result<ConvertReceipt> {
        let result = self
            .apply_convert(user_id, from_currency, to_currency, amount)
            .await;
        self.record(&result, Metrics::conversion_completed);
        result
    }

    /// Balances of every wallet the user owns.
    #[instrument(skip(self))]
    pub async fn get_balances(&self, user_id: UserId) -> Result<BTreeMap<Currency, Decimal>> {
        let mut unit = self.ledger.begin().await?;
        self.ensure_user(unit.as_mut(), user_id).await?;

        let wallets = unit.list_wallets(user_id).await?;
        unit.commit().await?;

        Ok(wallets.into_iter().map(|w| (w.currency, w.balance)).collect())
    }

    /// Newest transactions of a user, capped at `limit`.
    pub async fn get_transactions(
        &self,
        user_id: UserId,
        limit: Option<usize>,
    ) -> Result<TransactionHistory> {
        self.history(user_id, TransactionQuery::latest(history_limit(limit)))
            .await
    }

    /// Newest transactions of one type, capped at `limit`.
    pub async fn get_transactions_by_type(
        &self,
        user_id: UserId,
        transaction_type: TransactionType,
        limit: Option<usize>,
    ) -> Result<TransactionHistory> {
        let query = TransactionQuery::latest(history_limit(limit)).of_type(transaction_type);
        self.history(user_id, query).await
    }

    /// Rates currently in effect.
    pub fn get_current_rates(&self) -> RateSnapshot {
        self.rates.get_rates()
    }

    async fn apply_fund(
        &self,
        user_id: UserId,
        currency: Currency,
        amount: Decimal,
    ) -> Result<FundReceipt> {
        let amount = validate_amount(amount)?;

        let mut unit = self.ledger.begin().await?;
        self.ensure_user(unit.as_mut(), user_id).await?;

        let wallet = unit.get_or_create_wallet(user_id, currency).await?;
        let new_balance = self.credit(currency, wallet.balance, amount)?;

        let wallet = unit.update_balance(user_id, currency, new_balance).await?;
        let tx = unit
            .create_transaction(NewTransaction::fund(user_id, currency, amount))
            .await?;
        unit.commit().await?;

        info!(
            user_id = %user_id,
            currency = %currency,
            amount = %amount,
            new_balance = %wallet.balance,
            transaction_id = %tx.id,
            "Wallet funded"
        );

        Ok(FundReceipt {
            user_id,
            currency,
            amount,
            new_balance: wallet.balance,
            transaction_id: tx.id,
        })
    }

    async fn apply_withdraw(
        &self,
        user_id: UserId,
        currency: Currency,
        amount: Decimal,
    ) -> Result<WithdrawReceipt> {
        let amount = validate_amount(amount)?;

        let mut unit = self.ledger.begin().await?;
        self.ensure_user(unit.as_mut(), user_id).await?;

        let wallet = unit
            .get_wallet(user_id, currency)
            .await?
            .ok_or(WalletError::WalletNotFound { user_id, currency })?;

        if !wallet.has_sufficient_funds(amount) {
            return Err(WalletError::InsufficientFunds {
                required: amount,
                available: wallet.balance,
            });
        }

        let wallet = unit
            .update_balance(user_id, currency, wallet.balance - amount)
            .await?;
        let tx = unit
            .create_transaction(NewTransaction::withdraw(user_id, currency, amount))
            .await?;
        unit.commit().await?;

        info!(
            user_id = %user_id,
            currency = %currency,
            amount = %amount,
            new_balance = %wallet.balance,
            transaction_id = %tx.id,
            "Wallet debited"
        );

        Ok(WithdrawReceipt {
            user_id,
            currency,
            amount,
            new_balance: wallet.balance,
            transaction_id: tx.id,
        })
    }

    async fn apply_convert(
        &self,
        user_id: UserId,
        from_currency: Currency,
        to_currency: Currency,
        amount: Decimal,
    ) -> Result<ConvertReceipt> {
        if from_currency == to_currency {
            return Err(WalletError::SameCurrency(from_currency));
        }
        let amount = validate_amount(amount)?;

        let mut unit = self.ledger.begin().await?;
        self.ensure_user(unit.as_mut(), user_id).await?;

        // Wallets are always locked in currency order.
        let mut source = None;
        let mut destination = None;
        for currency in ordered(from_currency, to_currency) {
            if currency == from_currency {
                source = unit.get_wallet(user_id, from_currency).await?;
            } else {
                destination = Some(unit.get_or_create_wallet(user_id, to_currency).await?);
            }
        }

        let source = source.ok_or(WalletError::WalletNotFound {
            user_id,
            currency: from_currency,
        })?;
        let destination = destination.ok_or_else(|| {
            WalletError::Internal(format!("{} wallet was not opened", to_currency))
        })?;

        if !source.has_sufficient_funds(amount) {
            return Err(WalletError::InsufficientFunds {
                required: amount,
                available: source.balance,
            });
        }

        let fx_rate = self.rates.rate_for(from_currency, to_currency).ok_or_else(|| {
            WalletError::Internal(format!("no rate for {}->{}", from_currency, to_currency))
        })?;
        let to_amount = amount
            .checked_mul(fx_rate)
            .filter(|converted| *converted <= MAX_AMOUNT)
            .map(round_amount)
            .ok_or_else(|| {
                WalletError::InvalidAmount(format!(
                    "{} {} converts to more than {}",
                    amount, from_currency, MAX_AMOUNT
                ))
            })?;

        let credited = self.credit(to_currency, destination.balance, to_amount)?;

        unit.update_balance(user_id, from_currency, source.balance - amount)
            .await?;
        unit.update_balance(user_id, to_currency, credited).await?;
        let tx = unit
            .create_transaction(NewTransaction::convert(
                user_id,
                from_currency,
                to_currency,
                amount,
                to_amount,
                fx_rate,
            ))
            .await?;
        unit.commit().await?;

        info!(
            user_id = %user_id,
            from_currency = %from_currency,
            to_currency = %to_currency,
            from_amount = %amount,
            to_amount = %to_amount,
            fx_rate = %fx_rate,
            transaction_id = %tx.id,
            "Currency converted"
        );

        Ok(ConvertReceipt {
            user_id,
            from_currency,
            to_currency,
            from_amount: amount,
            to_amount,
            fx_rate,
            transaction_id: tx.id,
        })
    }

    #[instrument(skip(self))]
    async fn history(&self, user_id: UserId, query: TransactionQuery) -> Result<TransactionHistory> {
        let mut unit = self.ledger.begin().await?;
        self.ensure_user(unit.as_mut(), user_id).await?;

        let transactions = unit.list_transactions(user_id, query).await?;
        unit.commit().await?;

        Ok(TransactionHistory {
            user_id,
            total: transactions.len(),
            transactions,
        })
    }

    async fn ensure_user(&self, unit: &mut dyn LedgerUnit, user_id: UserId) -> Result<()> {
        if self.config.validate_users && !unit.user_exists(user_id).await? {
            return Err(WalletError::UserNotFound(user_id));
        }
        Ok(())
    }

    /// Balance after adding `amount`, bounded by the configured cap and by
    /// what storage can hold.
    fn credit(&self, currency: Currency, balance: Decimal, amount: Decimal) -> Result<Decimal> {
        let limit = self
            .config
            .max_balance
            .map_or(MAX_AMOUNT, |cap| cap.min(MAX_AMOUNT));

        match balance.checked_add(amount) {
            Some(credited) if credited <= limit => Ok(credited),
            Some(credited) => Err(WalletError::BalanceLimitExceeded {
                currency,
                balance: credited,
                limit,
            }),
            None => Err(WalletError::InvalidAmount(format!(
                "amount {} overflows the {} balance",
                amount, currency
            ))),
        }
    }

    fn record<T>(&self, result: &Result<T>, on_success: fn(&Metrics)) {
        match result {
            Ok(_) => on_success(&self.metrics),
            Err(e) if e.is_business_error() => {
                self.metrics.operation_rejected();
                warn!(code = e.error_code(), error = %e, "Wallet operation rejected");
            }
            Err(e) => {
                self.metrics.internal_error();
                error!(error = %e, "Wallet operation failed");
            }
        }
    }
}

fn history_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_HISTORY_LIMIT)
}

fn ordered(a: Currency, b: Currency) -> [Currency; 2] {
    if a <= b {
        [a, b]
    } else {
        [b, a]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxwallet_fx::RateMode;
    use fxwallet_ledger::{InMemoryLedger, TransactionKind, User};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    const ALICE: UserId = UserId::new(1);

    fn rates(usd_to_mxn: Decimal, mxn_to_usd: Decimal) -> Arc<RateStore> {
        Arc::new(RateStore::new(
            RateSnapshot::new(usd_to_mxn, mxn_to_usd, RateMode::Static).unwrap(),
        ))
    }

    fn engine_with(rates: Arc<RateStore>, config: EngineConfig) -> (WalletEngine, InMemoryLedger) {
        let ledger = InMemoryLedger::with_users([
            User::new(UserId::new(1), "alice@example.com", "Alice"),
            User::new(UserId::new(2), "bob@example.com", "Bob"),
        ]);
        let engine = WalletEngine::new(Arc::new(ledger.clone()), rates, config);
        (engine, ledger)
    }

    fn engine() -> (WalletEngine, InMemoryLedger) {
        engine_with(rates(dec!(18.70), dec!(0.0535)), EngineConfig::default())
    }

    #[tokio::test]
    async fn test_fund_creates_wallet_and_records_transaction() {
        let (engine, ledger) = engine();

        let receipt = engine.fund(ALICE, Currency::Usd, dec!(100)).await.unwrap();
        assert_eq!(receipt.new_balance, dec!(100.00));
        assert_eq!(receipt.amount.to_string(), "100.00");
        assert_eq!(receipt.transaction_id, TransactionId::new(1));

        let balances = engine.get_balances(ALICE).await.unwrap();
        assert_eq!(balances.get(&Currency::Usd), Some(&dec!(100.00)));
        assert!(!balances.contains_key(&Currency::Mxn));
        assert_eq!(ledger.transaction_count().await, 1);
        assert_eq!(engine.metrics().snapshot().funds_total, 1);
    }

    #[tokio::test]
    async fn test_invalid_amounts_rejected() {
        let (engine, ledger) = engine();

        for amount in [dec!(0), dec!(-5), dec!(1.001)] {
            let err = engine.fund(ALICE, Currency::Usd, amount).await.unwrap_err();
            assert_eq!(err.error_code(), "INVALID_AMOUNT");
        }
        assert_eq!(ledger.transaction_count().await, 0);
        assert_eq!(engine.metrics().snapshot().rejected_total, 3);
    }

    #[tokio::test]
    async fn test_withdraw_more_than_balance() {
        let (engine, ledger) = engine();
        engine.fund(ALICE, Currency::Usd, dec!(50)).await.unwrap();

        let err = engine
            .withdraw(ALICE, Currency::Usd, dec!(50.01))
            .await
            .unwrap_err();
        match err {
            WalletError::InsufficientFunds {
                required,
                available,
            } => {
                assert_eq!(required, dec!(50.01));
                assert_eq!(available, dec!(50.00));
            }
            other => panic!("unexpected error: {other}"),
        }

        let balances = engine.get_balances(ALICE).await.unwrap();
        assert_eq!(balances[&Currency::Usd], dec!(50.00));
        assert_eq!(ledger.transaction_count().await, 1);
    }

    #[tokio::test]
    async fn test_withdraw_without_wallet() {
        let (engine, _) = engine();
        let err = engine
            .withdraw(ALICE, Currency::Mxn, dec!(1))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::WalletNotFound { .. }));
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_withdraw_to_zero_keeps_wallet() {
        let (engine, _) = engine();
        engine.fund(ALICE, Currency::Mxn, dec!(10)).await.unwrap();

        let receipt = engine.withdraw(ALICE, Currency::Mxn, dec!(10)).await.unwrap();
        assert_eq!(receipt.new_balance, Decimal::ZERO);

        let balances = engine.get_balances(ALICE).await.unwrap();
        assert_eq!(balances[&Currency::Mxn].to_string(), "0.00");
    }

    #[tokio::test]
    async fn test_convert_usd_to_mxn() {
        let (engine, _) = engine();
        engine.fund(ALICE, Currency::Usd, dec!(1000)).await.unwrap();
        engine.fund(ALICE, Currency::Mxn, dec!(5000)).await.unwrap();

        let receipt = engine
            .convert(ALICE, Currency::Usd, Currency::Mxn, dec!(100.00))
            .await
            .unwrap();
        assert_eq!(receipt.to_amount, dec!(1870.00));
        assert_eq!(receipt.fx_rate, dec!(18.70));

        let balances = engine.get_balances(ALICE).await.unwrap();
        assert_eq!(balances[&Currency::Usd], dec!(900.00));
        assert_eq!(balances[&Currency::Mxn], dec!(6870.00));

        let history = engine
            .get_transactions_by_type(ALICE, TransactionType::Convert, None)
            .await
            .unwrap();
        assert_eq!(history.total, 1);
        match &history.transactions[0].kind {
            TransactionKind::Convert {
                from_amount,
                to_amount,
                fx_rate,
                ..
            } => {
                assert_eq!(*from_amount, dec!(100.00));
                assert_eq!(*to_amount, dec!(1870.00));
                assert_eq!(*fx_rate, dec!(18.70));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_convert_creates_destination_wallet() {
        let (engine, _) = engine();
        engine.fund(ALICE, Currency::Mxn, dec!(1000)).await.unwrap();

        let receipt = engine
            .convert(ALICE, Currency::Mxn, Currency::Usd, dec!(1000))
            .await
            .unwrap();
        assert_eq!(receipt.to_amount, dec!(53.50));
        assert_eq!(receipt.fx_rate, dec!(0.0535));

        let balances = engine.get_balances(ALICE).await.unwrap();
        assert_eq!(balances[&Currency::Usd], dec!(53.50));
        assert_eq!(balances[&Currency::Mxn], dec!(0.00));
    }

    #[tokio::test]
    async fn test_convert_rounds_half_up() {
        let (engine, _) = engine();
        engine.fund(ALICE, Currency::Usd, dec!(1)).await.unwrap();

        let receipt = engine
            .convert(ALICE, Currency::Usd, Currency::Mxn, dec!(0.05))
            .await
            .unwrap();
        assert_eq!(receipt.to_amount, dec!(0.94));
    }

    #[tokio::test]
    async fn test_convert_same_currency_checked_first() {
        let (engine, _) = engine();
        let err = engine
            .convert(ALICE, Currency::Usd, Currency::Usd, dec!(-1))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::SameCurrency(Currency::Usd)));
    }

    #[tokio::test]
    async fn test_convert_without_source_wallet_leaves_nothing() {
        let (engine, ledger) = engine();

        let err = engine
            .convert(ALICE, Currency::Usd, Currency::Mxn, dec!(10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WalletError::WalletNotFound {
                currency: Currency::Usd,
                ..
            }
        ));

        assert!(engine.get_balances(ALICE).await.unwrap().is_empty());
        assert_eq!(ledger.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn test_convert_insufficient_funds() {
        let (engine, _) = engine();
        engine.fund(ALICE, Currency::Usd, dec!(10)).await.unwrap();

        let err = engine
            .convert(ALICE, Currency::Usd, Currency::Mxn, dec!(10.01))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);

        let balances = engine.get_balances(ALICE).await.unwrap();
        assert_eq!(balances[&Currency::Usd], dec!(10.00));
        assert!(!balances.contains_key(&Currency::Mxn));
    }

    #[tokio::test]
    async fn test_balance_limit_rolls_back_conversion() {
        let config = EngineConfig {
            validate_users: true,
            max_balance: Some(dec!(1000.00)),
        };
        let (engine, ledger) = engine_with(rates(dec!(18.70), dec!(0.0535)), config);
        engine.fund(ALICE, Currency::Usd, dec!(100)).await.unwrap();

        let err = engine
            .convert(ALICE, Currency::Usd, Currency::Mxn, dec!(100))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "BALANCE_LIMIT_EXCEEDED");

        let balances = engine.get_balances(ALICE).await.unwrap();
        assert_eq!(balances[&Currency::Usd], dec!(100.00));
        assert!(!balances.contains_key(&Currency::Mxn));
        assert_eq!(ledger.transaction_count().await, 1);

        let err = engine.fund(ALICE, Currency::Usd, dec!(900.01)).await.unwrap_err();
        assert_eq!(err.status_code(), 422);
        engine.fund(ALICE, Currency::Usd, dec!(900.00)).await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_amounts_rejected_without_overflow() {
        let config = EngineConfig {
            validate_users: true,
            max_balance: Some(dec!(1000000.00)),
        };
        let (engine, ledger) = engine_with(rates(dec!(18.70), dec!(0.0535)), config);
        engine.fund(ALICE, Currency::Usd, dec!(1)).await.unwrap();

        let err = engine.fund(ALICE, Currency::Usd, Decimal::MAX).await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
        assert_eq!(engine.get_balances(ALICE).await.unwrap()[&Currency::Usd], dec!(1.00));
        assert_eq!(ledger.transaction_count().await, 1);

        // Without a configured cap the storage bound still applies.
        let (engine, _) = engine_with(rates(dec!(18.70), dec!(0.0535)), EngineConfig::default());
        engine.fund(ALICE, Currency::Usd, dec!(1)).await.unwrap();
        let err = engine.fund(ALICE, Currency::Usd, MAX_AMOUNT).await.unwrap_err();
        assert!(matches!(
            err,
            WalletError::BalanceLimitExceeded { limit, .. } if limit == MAX_AMOUNT
        ));

        let (engine, _) = engine_with(rates(dec!(18.70), dec!(0.0535)), EngineConfig::default());
        engine
            .fund(ALICE, Currency::Usd, dec!(100000000000000000))
            .await
            .unwrap();
        let err = engine
            .convert(ALICE, Currency::Usd, Currency::Mxn, dec!(100000000000000000))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
        let balances = engine.get_balances(ALICE).await.unwrap();
        assert_eq!(balances[&Currency::Usd], dec!(100000000000000000.00));
        assert!(!balances.contains_key(&Currency::Mxn));
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (engine, _) = engine();
        let stranger = UserId::new(99);

        let err = engine.fund(stranger, Currency::Usd, dec!(1)).await.unwrap_err();
        assert!(matches!(err, WalletError::UserNotFound(id) if id == stranger));
        assert!(engine.get_balances(stranger).await.is_err());
        assert!(engine.get_transactions(stranger, None).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_user_allowed_without_validation() {
        let config = EngineConfig {
            validate_users: false,
            max_balance: None,
        };
        let (engine, _) = engine_with(rates(dec!(18.70), dec!(0.0535)), config);

        let receipt = engine
            .fund(UserId::new(99), Currency::Usd, dec!(1))
            .await
            .unwrap();
        assert_eq!(receipt.new_balance, dec!(1.00));
    }

    #[tokio::test]
    async fn test_history_newest_first_and_capped() {
        let (engine, _) = engine();
        engine.fund(ALICE, Currency::Usd, dec!(10)).await.unwrap();
        engine.withdraw(ALICE, Currency::Usd, dec!(1)).await.unwrap();
        engine.fund(ALICE, Currency::Mxn, dec!(20)).await.unwrap();
        engine.fund(UserId::new(2), Currency::Usd, dec!(5)).await.unwrap();

        let history = engine.get_transactions(ALICE, None).await.unwrap();
        assert_eq!(history.total, 3);
        let ids: Vec<i64> = history.transactions.iter().map(|t| t.id.value()).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        let history = engine.get_transactions(ALICE, Some(2)).await.unwrap();
        assert_eq!(history.total, 2);
        assert_eq!(history.transactions[0].id.value(), 3);

        let withdrawals = engine
            .get_transactions_by_type(ALICE, TransactionType::Withdraw, None)
            .await
            .unwrap();
        assert_eq!(withdrawals.total, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_withdrawals() {
        let (engine, _) = engine();
        let engine = Arc::new(engine);
        engine.fund(ALICE, Currency::Usd, dec!(100.00)).await.unwrap();

        let a = tokio::spawn({
            let engine = engine.clone();
            async move { engine.withdraw(ALICE, Currency::Usd, dec!(80.00)).await }
        });
        let b = tokio::spawn({
            let engine = engine.clone();
            async move { engine.withdraw(ALICE, Currency::Usd, dec!(80.00)).await }
        });

        let results = [a.await.unwrap(), b.await.unwrap()];
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(WalletError::InsufficientFunds { .. }))));

        let balances = engine.get_balances(ALICE).await.unwrap();
        assert_eq!(balances[&Currency::Usd], dec!(20.00));
    }

    #[tokio::test]
    async fn test_current_rates() {
        let (engine, _) = engine();
        let snapshot = engine.get_current_rates();
        assert_eq!(snapshot.usd_to_mxn, dec!(18.70));
        assert_eq!(snapshot.mode, RateMode::Static);
    }

    proptest! {
        #[test]
        fn prop_fund_is_exact(initial in 1i64..10_000_000, added in 1i64..10_000_000) {
            let initial = Decimal::new(initial, 2);
            let added = Decimal::new(added, 2);

            let balance = tokio_test::block_on(async {
                let (engine, _) = engine_with(
                    rates(dec!(18.70), dec!(0.0535)),
                    EngineConfig { validate_users: true, max_balance: None },
                );
                engine.fund(ALICE, Currency::Mxn, initial).await.unwrap();
                engine.fund(ALICE, Currency::Mxn, added).await.unwrap();
                engine.get_balances(ALICE).await.unwrap()[&Currency::Mxn]
            });

            prop_assert_eq!(balance, initial + added);
        }

        #[test]
        fn prop_round_trip_at_reciprocal_rates(cents in 1i64..1_000_000) {
            let amount = Decimal::new(cents, 2);

            let back = tokio_test::block_on(async {
                let (engine, _) = engine_with(
                    rates(dec!(20.00), dec!(0.05)),
                    EngineConfig::default(),
                );
                engine.fund(ALICE, Currency::Usd, amount).await.unwrap();
                let there = engine
                    .convert(ALICE, Currency::Usd, Currency::Mxn, amount)
                    .await
                    .unwrap();
                engine
                    .convert(ALICE, Currency::Mxn, Currency::Usd, there.to_amount)
                    .await
                    .unwrap()
                    .to_amount
            });

            prop_assert!((back - amount).abs() <= dec!(0.01));
        }
    }
}
