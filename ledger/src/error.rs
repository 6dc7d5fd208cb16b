//! Ledger error types.

use fxwallet_common::{Currency, UserId, WalletError};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised by ledger storage.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database driver error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A write would leave a wallet below zero.
    #[error("Negative balance {balance} for user {user_id} in {currency}")]
    NegativeBalance {
        user_id: UserId,
        currency: Currency,
        balance: Decimal,
    },

    /// Balance update for a wallet that does not exist.
    #[error("Wallet missing for user {user_id} in {currency}")]
    WalletMissing { user_id: UserId, currency: Currency },

    /// Stored row cannot be mapped back to a record.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<LedgerError> for WalletError {
    fn from(err: LedgerError) -> Self {
        WalletError::Internal(err.to_string())
    }
}
