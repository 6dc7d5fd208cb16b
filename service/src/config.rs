//! Service configuration.

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::warn;

use fxwallet_common::constants;
use fxwallet_fx::{ApiProviderConfig, FxResult, RateMode, RateSnapshot, RateUpdaterConfig};

use crate::engine::EngineConfig;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Postgres connection URL.
    pub url: String,
    /// Pool size.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/fxwallet".to_string(),
            max_connections: 5,
        }
    }
}

/// FX rate configuration.
#[derive(Debug, Clone)]
pub struct RateConfig {
    /// Update strategy.
    pub mode: RateMode,
    /// Time between updater ticks.
    pub update_interval: Duration,
    /// Static / initial USD->MXN rate.
    pub usd_to_mxn: Decimal,
    /// Static / initial MXN->USD rate.
    pub mxn_to_usd: Decimal,
    /// Candidates for random mode.
    pub random_values: Vec<Decimal>,
    /// Exchange-rate API endpoint.
    pub api_url: String,
    /// Optional exchange-rate API key.
    pub api_key: Option<String>,
    /// Exchange-rate API request timeout.
    pub api_timeout: Duration,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            mode: RateMode::Static,
            update_interval: constants::default_rate_update_interval(),
            usd_to_mxn: Decimal::new(1870, 2),
            mxn_to_usd: Decimal::new(53, 3),
            random_values: [1850, 1860, 1870, 1880, 1890, 1900]
                .into_iter()
                .map(|v| Decimal::new(v, 2))
                .collect(),
            api_url: "https://api.exchangerate-api.com/v4/latest/USD".to_string(),
            api_key: None,
            api_timeout: constants::default_rate_api_timeout(),
        }
    }
}

/// Main service configuration.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// FX rate configuration.
    pub rates: RateConfig,
    /// Upper bound on any single wallet balance.
    pub max_balance_per_currency: Decimal,
    /// Reject operations for users the ledger does not know.
    pub validate_users: bool,
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            rates: RateConfig::default(),
            max_balance_per_currency: Decimal::new(100_000_000, 2),
            validate_users: true,
            log_level: "info".to_string(),
        }
    }
}

impl WalletConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    ///
    /// Missing keys keep their defaults. Unparsable values are logged and
    /// ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("DATABASE_URL") {
            config.database.url = url;
        }
        parse_into(&lookup, "DB_MAX_CONNECTIONS", &mut config.database.max_connections);

        parse_into(&lookup, "FX_RATE_MODE", &mut config.rates.mode);
        if let Some(secs) = parse_value::<u64>(&lookup, "FX_RATE_UPDATE_INTERVAL") {
            config.rates.update_interval = Duration::from_secs(secs);
        }
        parse_into(&lookup, "FX_RATE_USD_TO_MXN", &mut config.rates.usd_to_mxn);
        parse_into(&lookup, "FX_RATE_MXN_TO_USD", &mut config.rates.mxn_to_usd);

        if let Some(raw) = lookup("FX_RATE_RANDOM_VALUES") {
            match parse_candidates(&raw) {
                Some(values) => config.rates.random_values = values,
                None => {
                    warn!(value = %raw, "Invalid FX_RATE_RANDOM_VALUES");
                    config.rates.random_values.clear();
                }
            }
        }

        if let Some(url) = lookup("EXCHANGERATE_API_URL") {
            config.rates.api_url = url;
        }
        config.rates.api_key = lookup("EXCHANGERATE_API_KEY").filter(|k| !k.trim().is_empty());
        if let Some(secs) = parse_value::<u64>(&lookup, "EXCHANGERATE_API_TIMEOUT") {
            config.rates.api_timeout = Duration::from_secs(secs);
        }

        parse_into(
            &lookup,
            "MAX_BALANCE_PER_CURRENCY",
            &mut config.max_balance_per_currency,
        );
        parse_into(&lookup, "VALIDATE_USERS", &mut config.validate_users);

        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        if config.rates.mode == RateMode::Random && config.rates.random_values.is_empty() {
            warn!("No usable random FX rate candidates, falling back to static mode");
            config.rates.mode = RateMode::Static;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }

        if self.database.max_connections == 0 {
            return Err("Database pool needs at least one connection".to_string());
        }

        if self.rates.update_interval.is_zero() {
            return Err("FX rate update interval cannot be 0".to_string());
        }

        if self.rates.usd_to_mxn <= Decimal::ZERO || self.rates.mxn_to_usd <= Decimal::ZERO {
            return Err("Static FX rates must be positive".to_string());
        }

        if self.max_balance_per_currency <= Decimal::ZERO {
            return Err("Maximum balance must be positive".to_string());
        }

        if self.rates.mode == RateMode::Api {
            if self.rates.api_url.is_empty() {
                return Err("Exchange-rate API URL cannot be empty in api mode".to_string());
            }
            if self.rates.api_timeout.is_zero() {
                return Err("Exchange-rate API timeout cannot be 0 in api mode".to_string());
            }
        }

        Ok(())
    }

    /// Snapshot the rate store starts with.
    pub fn initial_snapshot(&self) -> FxResult<RateSnapshot> {
        RateSnapshot::new(self.rates.usd_to_mxn, self.rates.mxn_to_usd, self.rates.mode)
    }

    /// Settings for the scheduled rate updater.
    pub fn updater_config(&self) -> RateUpdaterConfig {
        RateUpdaterConfig {
            mode: self.rates.mode,
            update_interval: self.rates.update_interval,
            random_values: self.rates.random_values.clone(),
            api: ApiProviderConfig {
                url: self.rates.api_url.clone(),
                api_key: self.rates.api_key.clone(),
                timeout: self.rates.api_timeout,
            },
        }
    }

    /// Settings for the wallet engine.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            validate_users: self.validate_users,
            max_balance: Some(self.max_balance_per_currency),
        }
    }
}

fn parse_value<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}

fn parse_into<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) {
    if let Some(value) = parse_value(lookup, key) {
        *target = value;
    }
}

/// Parse a comma-separated list of positive rates.
fn parse_candidates(raw: &str) -> Option<Vec<Decimal>> {
    let values = raw
        .split(',')
        .map(|v| v.trim().parse::<Decimal>().ok().filter(|d| *d > Decimal::ZERO))
        .collect::<Option<Vec<_>>>()?;

    (!values.is_empty()).then_some(values)
}
