//! Immutable transaction records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use fxwallet_common::{Currency, TransactionId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Discriminant of a transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Fund,
    Withdraw,
    Convert,
}

impl TransactionType {
    /// Get the stored name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Fund => "fund",
            TransactionType::Withdraw => "withdraw",
            TransactionType::Convert => "convert",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fund" => Ok(TransactionType::Fund),
            "withdraw" => Ok(TransactionType::Withdraw),
            "convert" => Ok(TransactionType::Convert),
            other => Err(format!("unknown transaction type '{}'", other)),
        }
    }
}

/// What a transaction did. Each variant carries only its own fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transaction_type", rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money added to a wallet.
    Fund { currency: Currency, amount: Decimal },
    /// Money taken out of a wallet.
    Withdraw { currency: Currency, amount: Decimal },
    /// Money moved between the user's two wallets at `fx_rate`.
    Convert {
        from_currency: Currency,
        to_currency: Currency,
        from_amount: Decimal,
        to_amount: Decimal,
        fx_rate: Decimal,
    },
}

impl TransactionKind {
    /// Get the discriminant.
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            TransactionKind::Fund { .. } => TransactionType::Fund,
            TransactionKind::Withdraw { .. } => TransactionType::Withdraw,
            TransactionKind::Convert { .. } => TransactionType::Convert,
        }
    }
}

/// A transaction to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub kind: TransactionKind,
}

impl NewTransaction {
    pub fn fund(user_id: UserId, currency: Currency, amount: Decimal) -> Self {
        Self {
            user_id,
            kind: TransactionKind::Fund { currency, amount },
        }
    }

    pub fn withdraw(user_id: UserId, currency: Currency, amount: Decimal) -> Self {
        Self {
            user_id,
            kind: TransactionKind::Withdraw { currency, amount },
        }
    }

    pub fn convert(
        user_id: UserId,
        from_currency: Currency,
        to_currency: Currency,
        from_amount: Decimal,
        to_amount: Decimal,
        fx_rate: Decimal,
    ) -> Self {
        Self {
            user_id,
            kind: TransactionKind::Convert {
                from_currency,
                to_currency,
                from_amount,
                to_amount,
                fx_rate,
            },
        }
    }
}

/// A stored transaction. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Ledger-assigned identifier.
    pub id: TransactionId,
    /// Owner.
    pub user_id: UserId,
    /// Operation details.
    #[serde(flatten)]
    pub kind: TransactionKind,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Get the discriminant.
    pub fn transaction_type(&self) -> TransactionType {
        self.kind.transaction_type()
    }
}

/// Filter for transaction history reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionQuery {
    /// Maximum number of records returned.
    pub limit: usize,
    /// Restrict to one type.
    pub transaction_type: Option<TransactionType>,
}

impl TransactionQuery {
    /// Newest `limit` records of any type.
    pub fn latest(limit: usize) -> Self {
        Self {
            limit,
            transaction_type: None,
        }
    }

    /// Restrict the query to one type.
    pub fn of_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = Some(transaction_type);
        self
    }

    /// Check whether a record passes the type filter.
    pub fn matches(&self, transaction: &Transaction) -> bool {
        self.transaction_type
            .map_or(true, |t| t == transaction.transaction_type())
    }
}
