//! Error types for wallet operations.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{Currency, UserId};

/// Main error type for wallet operations.
#[derive(Error, Debug)]
pub enum WalletError {
    /// Amount is zero, negative, or too precise.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Conversion between a currency and itself.
    #[error("Cannot convert {0} to itself")]
    SameCurrency(Currency),

    /// The user has no wallet in this currency.
    #[error("Wallet not found for user {user_id} in {currency}")]
    WalletNotFound { user_id: UserId, currency: Currency },

    /// Balance is lower than the requested amount.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    /// Unknown user.
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// Operation would push a balance over the configured ceiling.
    #[error("Balance limit exceeded: {balance} {currency} is above {limit}")]
    BalanceLimitExceeded {
        currency: Currency,
        balance: Decimal,
        limit: Decimal,
    },

    /// Currency code outside the supported set.
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    /// Persistence or other internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WalletError {
    /// Get error code for caller-facing responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            WalletError::InvalidAmount(_) => "INVALID_AMOUNT",
            WalletError::SameCurrency(_) => "SAME_CURRENCY",
            WalletError::WalletNotFound { .. } => "WALLET_NOT_FOUND",
            WalletError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            WalletError::UserNotFound(_) => "USER_NOT_FOUND",
            WalletError::BalanceLimitExceeded { .. } => "BALANCE_LIMIT_EXCEEDED",
            WalletError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            WalletError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP-equivalent status for the error.
    pub fn status_code(&self) -> u16 {
        match self {
            WalletError::InvalidAmount(_) | WalletError::SameCurrency(_) => 400,
            WalletError::WalletNotFound { .. } | WalletError::UserNotFound(_) => 404,
            WalletError::InsufficientFunds { .. } => 409,
            WalletError::BalanceLimitExceeded { .. } | WalletError::UnsupportedCurrency(_) => 422,
            WalletError::Internal(_) => 500,
        }
    }

    /// Check if this error is a business rule rejection rather than a failure.
    pub fn is_business_error(&self) -> bool {
        !matches!(self, WalletError::Internal(_))
    }

    /// Message safe to show to callers. Internal details are withheld.
    pub fn public_message(&self) -> String {
        match self {
            WalletError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for wallet operations.
pub type Result<T> = std::result::Result<T, WalletError>;
