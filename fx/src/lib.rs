//! fxwallet FX Rates
//!
//! Holds the USD/MXN rates used for wallet conversions and keeps them fresh.
//!
//! # Features
//!
//! - Shared [`RateStore`] read by wallet operations, written by one updater
//! - Three update strategies: static, random candidates, external API
//! - Scheduled [`RateUpdater`] whose failed ticks are logged and skipped
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fxwallet_fx::{RateMode, RateSnapshot, RateStore, RateUpdater};
//!
//! let store = Arc::new(RateStore::new(RateSnapshot::new(usd_to_mxn, mxn_to_usd, RateMode::Static)?));
//! let updater = RateUpdater::from_config(&config, store.clone())?;
//! updater.start().await;
//!
//! let rates = store.get_rates();
//! ```

pub mod error;
pub mod provider;
pub mod snapshot;
pub mod store;
pub mod updater;

pub use error::{FxError, FxResult};
pub use provider::{ApiProviderConfig, ExchangeRateApiProvider, RandomRateSource, RateSource};
#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateSource;
pub use snapshot::{RateMode, RateSnapshot};
pub use store::RateStore;
pub use updater::{RateUpdater, RateUpdaterConfig, TickOutcome, UpdaterState, UpdaterStats};
