//! FX error types.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur while producing or storing FX rates.
#[derive(Debug, Error)]
pub enum FxError {
    /// Rate is zero or negative.
    #[error("Invalid rate: {0}")]
    InvalidRate(Decimal),

    /// Provider request failed (connection, non-2xx status).
    #[error("Rate provider error: {0}")]
    ProviderError(String),

    /// Provider did not answer within the configured timeout.
    #[error("Rate provider timed out: {0}")]
    Timeout(String),

    /// Provider answered with a body that could not be decoded.
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    /// Provider response did not contain the requested rate.
    #[error("Rate for {0} not found in provider response")]
    RateNotFound(String),

    /// Random source configured without candidate values.
    #[error("No candidate rates configured")]
    NoCandidates,
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
