//! User and wallet records.

use chrono::{DateTime, Utc};
use fxwallet_common::{Currency, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A known wallet owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier.
    pub id: UserId,
    /// Contact email.
    pub email: String,
    /// Full name.
    pub name: String,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user.
    pub fn new(id: UserId, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Balance held by one user in one currency.
///
/// There is at most one wallet per `(user_id, currency)` and its balance is
/// never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Owner.
    pub user_id: UserId,
    /// Wallet currency.
    pub currency: Currency,
    /// Current balance, two fraction digits.
    pub balance: Decimal,
}

impl Wallet {
    /// Create an empty wallet.
    pub fn empty(user_id: UserId, currency: Currency) -> Self {
        let mut balance = Decimal::ZERO;
        balance.rescale(currency.decimal_places());
        Self {
            user_id,
            currency,
            balance,
        }
    }

    /// Check if the wallet can cover an amount.
    pub fn has_sufficient_funds(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }
}
