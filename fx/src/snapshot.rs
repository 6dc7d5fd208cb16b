//! Rate snapshot and update mode.

use std::fmt;
use std::str::FromStr;

use fxwallet_common::{now, round_rate, Currency, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{FxError, FxResult};

/// How the current rates are kept fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateMode {
    /// Fixed rates from configuration, never updated.
    Static,
    /// A value drawn from a configured candidate list every interval.
    Random,
    /// Rates fetched from the external provider every interval.
    Api,
}

impl RateMode {
    /// Get the configuration name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            RateMode::Static => "static",
            RateMode::Random => "random",
            RateMode::Api => "api",
        }
    }

    /// Whether a background updater runs in this mode.
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, RateMode::Static)
    }
}

impl fmt::Display for RateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(RateMode::Static),
            "random" => Ok(RateMode::Random),
            "api" => Ok(RateMode::Api),
            other => Err(format!("unknown FX rate mode '{}'", other)),
        }
    }
}

/// USD/MXN rates in effect at one point in time.
///
/// Snapshots built with [`RateSnapshot::from_usd_to_mxn`] derive `mxn_to_usd`
/// as the reciprocal of `usd_to_mxn`, rounded half-up to four places.
/// Snapshots built with [`RateSnapshot::new`] keep both rates as given; this
/// is how configured static rates are loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSnapshot {
    /// Units of MXN per USD.
    pub usd_to_mxn: Decimal,
    /// Units of USD per MXN.
    pub mxn_to_usd: Decimal,
    /// Mode that produced the snapshot.
    pub mode: RateMode,
    /// When the snapshot was built.
    pub updated_at: Timestamp,
}

impl RateSnapshot {
    /// Create a snapshot from two independently configured rates.
    pub fn new(usd_to_mxn: Decimal, mxn_to_usd: Decimal, mode: RateMode) -> FxResult<Self> {
        ensure_positive(usd_to_mxn)?;
        ensure_positive(mxn_to_usd)?;

        Ok(Self {
            usd_to_mxn: round_rate(usd_to_mxn),
            mxn_to_usd: round_rate(mxn_to_usd),
            mode,
            updated_at: now(),
        })
    }

    /// Create a snapshot whose MXN->USD rate is the reciprocal of `usd_to_mxn`.
    pub fn from_usd_to_mxn(usd_to_mxn: Decimal, mode: RateMode) -> FxResult<Self> {
        ensure_positive(usd_to_mxn)?;
        let usd_to_mxn = round_rate(usd_to_mxn);
        ensure_positive(usd_to_mxn)?;

        let mxn_to_usd = round_rate(Decimal::ONE / usd_to_mxn);
        ensure_positive(mxn_to_usd)?;

        Ok(Self {
            usd_to_mxn,
            mxn_to_usd,
            mode,
            updated_at: now(),
        })
    }

    /// Rate to multiply a `from` amount by to obtain a `to` amount.
    ///
    /// Returns `None` when both currencies are the same.
    pub fn rate_for(&self, from: Currency, to: Currency) -> Option<Decimal> {
        match (from, to) {
            (Currency::Usd, Currency::Mxn) => Some(self.usd_to_mxn),
            (Currency::Mxn, Currency::Usd) => Some(self.mxn_to_usd),
            _ => None,
        }
    }

    /// Check both rates are positive.
    pub fn validate(&self) -> FxResult<()> {
        ensure_positive(self.usd_to_mxn)?;
        ensure_positive(self.mxn_to_usd)
    }
}

fn ensure_positive(rate: Decimal) -> FxResult<()> {
    if rate <= Decimal::ZERO {
        return Err(FxError::InvalidRate(rate));
    }
    Ok(())
}
