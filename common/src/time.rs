//! Time utilities and defaults for fxwallet.

use chrono::{DateTime, Utc};

/// Default timing values.
pub mod constants {
    use std::time::Duration;

    /// Default FX rate refresh interval (5 minutes).
    pub fn default_rate_update_interval() -> Duration {
        Duration::from_secs(300)
    }

    /// Default timeout for the external rate provider (10 seconds).
    pub fn default_rate_api_timeout() -> Duration {
        Duration::from_secs(10)
    }
}

/// A timestamp, always UTC.
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(constants::default_rate_update_interval().as_secs(), 300);
        assert_eq!(constants::default_rate_api_timeout().as_secs(), 10);
    }

    #[test]
    fn test_now_is_monotonic_enough() {
        let a = now();
        let b = now();
        assert!(b >= a);
    }
}
