//! Rate sources used by the scheduled updater.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{FxError, FxResult};
use crate::snapshot::RateMode;

/// Trait for producers of a fresh USD->MXN rate.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Get the source name.
    fn name(&self) -> &str;

    /// Mode recorded on snapshots built from this source.
    fn mode(&self) -> RateMode;

    /// Produce the next USD->MXN rate.
    async fn next_usd_to_mxn(&self) -> FxResult<Decimal>;
}

/// Picks a USD->MXN rate uniformly from a fixed candidate list.
pub struct RandomRateSource {
    candidates: Vec<Decimal>,
}

impl RandomRateSource {
    /// Create a random source. Fails when no candidates are given.
    pub fn new(candidates: Vec<Decimal>) -> FxResult<Self> {
        if candidates.is_empty() {
            return Err(FxError::NoCandidates);
        }
        if let Some(bad) = candidates.iter().find(|c| **c <= Decimal::ZERO) {
            return Err(FxError::InvalidRate(*bad));
        }
        Ok(Self { candidates })
    }

    /// Configured candidate values.
    pub fn candidates(&self) -> &[Decimal] {
        &self.candidates
    }
}

#[async_trait]
impl RateSource for RandomRateSource {
    fn name(&self) -> &str {
        "RANDOM"
    }

    fn mode(&self) -> RateMode {
        RateMode::Random
    }

    async fn next_usd_to_mxn(&self) -> FxResult<Decimal> {
        self.candidates
            .choose(&mut rand::thread_rng())
            .copied()
            .ok_or(FxError::NoCandidates)
    }
}

/// Settings for the exchange-rate HTTP provider.
#[derive(Debug, Clone)]
pub struct ApiProviderConfig {
    /// Endpoint returning latest rates with USD as base.
    pub url: String,
    /// Optional key, sent as the `access_key` query parameter.
    pub api_key: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
}

/// Fetches the USD->MXN rate from an exchangerate-api style endpoint.
///
/// The endpoint must answer `{"rates": {"MXN": <number>, ...}}`.
pub struct ExchangeRateApiProvider {
    client: reqwest::Client,
    config: ApiProviderConfig,
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    rates: HashMap<String, serde_json::Value>,
}

impl ExchangeRateApiProvider {
    /// Create a provider with its own HTTP client.
    pub fn new(config: ApiProviderConfig) -> FxResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FxError::ProviderError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn map_request_error(&self, err: reqwest::Error) -> FxError {
        if err.is_timeout() {
            FxError::Timeout(format!(
                "no answer from {} within {:?}",
                self.config.url, self.config.timeout
            ))
        } else {
            FxError::ProviderError(err.to_string())
        }
    }
}

/// Extract the MXN rate from a provider body.
fn parse_mxn_rate(body: &str) -> FxResult<Decimal> {
    let response: LatestRatesResponse =
        serde_json::from_str(body).map_err(|e| FxError::MalformedResponse(e.to_string()))?;

    let value = response
        .rates
        .get("MXN")
        .ok_or_else(|| FxError::RateNotFound("MXN".to_string()))?;

    let text = match value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => {
            return Err(FxError::MalformedResponse(format!(
                "MXN rate is not a number: {}",
                other
            )))
        }
    };

    let rate = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| FxError::MalformedResponse(format!("MXN rate '{}': {}", text, e)))?;

    if rate <= Decimal::ZERO {
        return Err(FxError::InvalidRate(rate));
    }
    Ok(rate)
}

#[async_trait]
impl RateSource for ExchangeRateApiProvider {
    fn name(&self) -> &str {
        "EXCHANGERATE_API"
    }

    fn mode(&self) -> RateMode {
        RateMode::Api
    }

    #[instrument(name = "ExchangeRateFetch", skip(self), fields(url = %self.config.url))]
    async fn next_usd_to_mxn(&self) -> FxResult<Decimal> {
        let mut request = self.client.get(&self.config.url);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.query(&[("access_key", key)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FxError::ProviderError(format!(
                "provider answered with status {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let rate = parse_mxn_rate(&body)?;
        debug!(rate = %rate, "Fetched USD->MXN rate");
        Ok(rate)
    }
}

/// Scripted rate source for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateSource {
    mode: RateMode,
    results: parking_lot::Mutex<std::collections::VecDeque<FxResult<Decimal>>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateSource {
    /// Create a mock that replays the given results, then reports errors.
    pub fn new(mode: RateMode, results: Vec<FxResult<Decimal>>) -> Self {
        Self {
            mode,
            results: parking_lot::Mutex::new(results.into()),
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateSource for MockRateSource {
    fn name(&self) -> &str {
        "MOCK"
    }

    fn mode(&self) -> RateMode {
        self.mode
    }

    async fn next_usd_to_mxn(&self) -> FxResult<Decimal> {
        self.results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(FxError::ProviderError("script exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer, timeout: Duration, api_key: Option<&str>) -> ExchangeRateApiProvider {
        ExchangeRateApiProvider::new(ApiProviderConfig {
            url: format!("{}/v4/latest/USD", server.uri()),
            api_key: api_key.map(str::to_string),
            timeout,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_random_source_draws_from_candidates() {
        let candidates = vec![dec!(18.50), dec!(18.70), dec!(19.00)];
        let source = RandomRateSource::new(candidates.clone()).unwrap();

        for _ in 0..50 {
            let rate = source.next_usd_to_mxn().await.unwrap();
            assert!(candidates.contains(&rate));
        }
        assert_eq!(source.mode(), RateMode::Random);
    }

    #[test]
    fn test_random_source_rejects_bad_candidates() {
        assert!(matches!(RandomRateSource::new(vec![]), Err(FxError::NoCandidates)));
        assert!(matches!(
            RandomRateSource::new(vec![dec!(18.5), dec!(0)]),
            Err(FxError::InvalidRate(_))
        ));
    }

    #[test]
    fn test_parse_mxn_rate() {
        assert_eq!(
            parse_mxn_rate(r#"{"base":"USD","rates":{"EUR":0.92,"MXN":17.25}}"#).unwrap(),
            dec!(17.25)
        );
        assert_eq!(parse_mxn_rate(r#"{"rates":{"MXN":"18.1"}}"#).unwrap(), dec!(18.1));
        assert!(matches!(
            parse_mxn_rate(r#"{"rates":{"EUR":0.92}}"#),
            Err(FxError::RateNotFound(_))
        ));
        assert!(matches!(
            parse_mxn_rate("<html>oops</html>"),
            Err(FxError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_mxn_rate(r#"{"rates":{"MXN":null}}"#),
            Err(FxError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_mxn_rate(r#"{"rates":{"MXN":-3}}"#),
            Err(FxError::InvalidRate(_))
        ));
    }

    #[tokio::test]
    async fn test_api_provider_fetches_rate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/latest/USD"))
            .and(query_param("access_key", "secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"base":"USD","rates":{"MXN":17.9312}}"#),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server, Duration::from_secs(2), Some("secret"));
        let rate = provider.next_usd_to_mxn().await.unwrap();
        assert_eq!(rate, dec!(17.9312));
    }

    #[tokio::test]
    async fn test_api_provider_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/latest/USD"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = provider_for(&server, Duration::from_secs(2), None);
        let err = provider.next_usd_to_mxn().await.unwrap_err();
        assert!(matches!(err, FxError::ProviderError(_)));
    }

    #[tokio::test]
    async fn test_api_provider_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/latest/USD"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"rates":{"MXN":17.0}}"#)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server, Duration::from_millis(50), None);
        let err = provider.next_usd_to_mxn().await.unwrap_err();
        assert!(matches!(err, FxError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_mock_source_replays_script() {
        let source = MockRateSource::new(
            RateMode::Api,
            vec![Ok(dec!(18.2)), Err(FxError::Timeout("slow".into()))],
        );
        assert_eq!(source.next_usd_to_mxn().await.unwrap(), dec!(18.2));
        assert!(source.next_usd_to_mxn().await.is_err());
        assert!(source.next_usd_to_mxn().await.is_err());
    }
}
