//! Monetary types for fxwallet.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WalletError;

/// Fraction digits carried by every wallet balance and transaction amount.
pub const AMOUNT_DECIMAL_PLACES: u32 = 2;

/// Fraction digits carried by exchange rates.
pub const RATE_DECIMAL_PLACES: u32 = 4;

/// Largest amount or balance a wallet can hold, `NUMERIC(20,2)` in storage:
/// 999,999,999,999,999,999.99.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_661_992_959, 1_808_227_885, 5, false, 2);

/// Supported wallet currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// US dollar.
    Usd,
    /// Mexican peso.
    Mxn,
}

impl Currency {
    /// All supported currencies, in display order.
    pub const ALL: [Currency; 2] = [Currency::Usd, Currency::Mxn];

    /// Get the ISO 4217 currency code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Mxn => "MXN",
        }
    }

    /// Get the standard decimal places for this currency.
    pub fn decimal_places(&self) -> u32 {
        AMOUNT_DECIMAL_PLACES
    }

    /// The other supported currency.
    pub fn counterpart(&self) -> Self {
        match self {
            Currency::Usd => Currency::Mxn,
            Currency::Mxn => Currency::Usd,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "MXN" => Ok(Currency::Mxn),
            _ => Err(WalletError::UnsupportedCurrency(s.to_string())),
        }
    }
}

/// Round an amount to two fraction digits, half away from zero.
pub fn round_amount(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(AMOUNT_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(AMOUNT_DECIMAL_PLACES);
    rounded
}

/// Round a rate to four fraction digits, half away from zero.
pub fn round_rate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(RATE_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Check that an operation amount is positive, has at most two fraction
/// digits and fits in a wallet balance.
pub fn validate_amount(amount: Decimal) -> Result<Decimal, WalletError> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount(format!(
            "amount must be greater than zero, got {}",
            amount
        )));
    }

    if amount.normalize().scale() > AMOUNT_DECIMAL_PLACES {
        return Err(WalletError::InvalidAmount(format!(
            "amount {} has more than {} decimal places",
            amount, AMOUNT_DECIMAL_PLACES
        )));
    }

    if amount > MAX_AMOUNT {
        return Err(WalletError::InvalidAmount(format!(
            "amount {} exceeds the maximum of {}",
            amount, MAX_AMOUNT
        )));
    }

    let mut amount = amount;
    amount.rescale(AMOUNT_DECIMAL_PLACES);
    Ok(amount)
}
