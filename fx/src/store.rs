//! Shared store for the current rate snapshot.

use fxwallet_common::Currency;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::FxResult;
use crate::snapshot::RateSnapshot;

/// Holds the rate snapshot currently in effect.
///
/// Written by the rate updater, read by wallet operations. Both sides only
/// copy a small value under the lock.
#[derive(Debug)]
pub struct RateStore {
    current: RwLock<RateSnapshot>,
}

impl RateStore {
    /// Create a store seeded with the startup snapshot.
    pub fn new(initial: RateSnapshot) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    /// Get the last stored snapshot.
    pub fn get_rates(&self) -> RateSnapshot {
        *self.current.read()
    }

    /// Replace the stored snapshot.
    pub fn set_rates(&self, snapshot: RateSnapshot) -> FxResult<()> {
        snapshot.validate()?;

        let previous = std::mem::replace(&mut *self.current.write(), snapshot);
        debug!(
            previous_usd_to_mxn = %previous.usd_to_mxn,
            usd_to_mxn = %snapshot.usd_to_mxn,
            mxn_to_usd = %snapshot.mxn_to_usd,
            mode = %snapshot.mode,
            "Rate snapshot replaced"
        );
        Ok(())
    }

    /// Rate for a conversion pair from the current snapshot.
    pub fn rate_for(&self, from: Currency, to: Currency) -> Option<Decimal> {
        self.get_rates().rate_for(from, to)
    }
}
