//! Scheduled rate updater.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, instrument, warn};

use crate::error::FxResult;
use crate::provider::{ApiProviderConfig, ExchangeRateApiProvider, RandomRateSource, RateSource};
use crate::snapshot::{RateMode, RateSnapshot};
use crate::store::RateStore;

/// Configuration for the rate updater.
#[derive(Debug, Clone)]
pub struct RateUpdaterConfig {
    /// Update strategy.
    pub mode: RateMode,
    /// Time between scheduled ticks.
    pub update_interval: Duration,
    /// Candidate USD->MXN values for random mode.
    pub random_values: Vec<Decimal>,
    /// Provider settings for api mode.
    pub api: ApiProviderConfig,
}

/// Updater lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdaterState {
    /// No scheduled task.
    Stopped,
    /// Scheduled task is ticking.
    Running,
}

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A new snapshot was stored.
    Applied(RateSnapshot),
    /// The tick failed; the previous snapshot stays in place.
    Skipped,
}

/// Tick counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdaterStats {
    pub ticks_applied: u64,
    pub ticks_skipped: u64,
}

struct UpdaterInner {
    store: Arc<RateStore>,
    source: Arc<dyn RateSource>,
    ticks_applied: AtomicU64,
    ticks_skipped: AtomicU64,
}

impl UpdaterInner {
    #[instrument(name = "RateTick", skip(self), fields(source = self.source.name()))]
    async fn tick(&self) -> TickOutcome {
        let snapshot = match self.source.next_usd_to_mxn().await {
            Ok(rate) => RateSnapshot::from_usd_to_mxn(rate, self.source.mode()),
            Err(e) => Err(e),
        };

        let result = snapshot.and_then(|s| self.store.set_rates(s).map(|_| s));

        match result {
            Ok(snapshot) => {
                self.ticks_applied.fetch_add(1, Ordering::Relaxed);
                info!(
                    mode = %snapshot.mode,
                    usd_to_mxn = %snapshot.usd_to_mxn,
                    mxn_to_usd = %snapshot.mxn_to_usd,
                    "FX rates updated"
                );
                TickOutcome::Applied(snapshot)
            }
            Err(e) => {
                self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "FX rate update failed, keeping previous rates");
                TickOutcome::Skipped
            }
        }
    }
}

struct RunningTask {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Keeps a [`RateStore`] fresh on a fixed interval.
///
/// Failures are logged and the tick is skipped; the schedule keeps running.
pub struct RateUpdater {
    inner: Option<Arc<UpdaterInner>>,
    mode: RateMode,
    interval: Duration,
    state: RwLock<UpdaterState>,
    task: Mutex<Option<RunningTask>>,
}

impl RateUpdater {
    /// Build an updater for the configured mode.
    ///
    /// In static mode the updater has no source and never starts.
    pub fn from_config(config: &RateUpdaterConfig, store: Arc<RateStore>) -> FxResult<Self> {
        let source: Option<Arc<dyn RateSource>> = match config.mode {
            RateMode::Static => None,
            RateMode::Random => Some(Arc::new(RandomRateSource::new(
                config.random_values.clone(),
            )?)),
            RateMode::Api => Some(Arc::new(ExchangeRateApiProvider::new(config.api.clone())?)),
        };

        Ok(match source {
            Some(source) => Self::with_source(store, source, config.update_interval),
            None => Self {
                inner: None,
                mode: RateMode::Static,
                interval: config.update_interval,
                state: RwLock::new(UpdaterState::Stopped),
                task: Mutex::new(None),
            },
        })
    }

    /// Build an updater around an explicit source.
    pub fn with_source(store: Arc<RateStore>, source: Arc<dyn RateSource>, interval: Duration) -> Self {
        Self {
            mode: source.mode(),
            inner: Some(Arc::new(UpdaterInner {
                store,
                source,
                ticks_applied: AtomicU64::new(0),
                ticks_skipped: AtomicU64::new(0),
            })),
            interval,
            state: RwLock::new(UpdaterState::Stopped),
            task: Mutex::new(None),
        }
    }

    /// Mode this updater serves.
    pub fn mode(&self) -> RateMode {
        self.mode
    }

    /// Current lifecycle state.
    pub fn state(&self) -> UpdaterState {
        *self.state.read()
    }

    /// Tick counters since construction.
    pub fn stats(&self) -> UpdaterStats {
        self.inner
            .as_ref()
            .map(|inner| UpdaterStats {
                ticks_applied: inner.ticks_applied.load(Ordering::Relaxed),
                ticks_skipped: inner.ticks_skipped.load(Ordering::Relaxed),
            })
            .unwrap_or_default()
    }

    /// Run one update now, outside the schedule.
    pub async fn tick(&self) -> TickOutcome {
        match &self.inner {
            Some(inner) => inner.tick().await,
            None => TickOutcome::Skipped,
        }
    }

    /// Start the schedule: one immediate tick, then one per interval.
    ///
    /// The first tick runs inside the scheduled task; this call waits for it
    /// unless [`stop`](Self::stop) cancels the schedule first. Returns `false`
    /// when nothing is left running (static mode, already running, or stopped
    /// during the first tick).
    pub async fn start(&self) -> bool {
        let Some(inner) = self.inner.clone() else {
            info!("FX rates mode is static, scheduler not started");
            return false;
        };

        if self.interval.is_zero() {
            warn!("FX rate update interval is zero, scheduler not started");
            return false;
        }

        let first_tick = {
            let mut task = self.task.lock();
            let mut state = self.state.write();
            if *state == UpdaterState::Running {
                warn!("FX rate scheduler is already running");
                return false;
            }

            let (shutdown_tx, shutdown_rx) = oneshot::channel();
            let (ready_tx, ready_rx) = oneshot::channel();
            let handle = tokio::spawn(run_schedule(inner, self.interval, shutdown_rx, ready_tx));

            *task = Some(RunningTask { shutdown_tx, handle });
            *state = UpdaterState::Running;
            ready_rx
        };

        if first_tick.await.is_err() {
            info!("FX rate scheduler stopped before its first tick completed");
            return false;
        }

        info!(
            mode = %self.mode,
            interval_secs = self.interval.as_secs_f64(),
            "FX rate scheduler started"
        );
        true
    }

    /// Stop the schedule and wait for the task to finish.
    ///
    /// A tick in flight is cancelled.
    pub async fn stop(&self) {
        let task = {
            let mut task = self.task.lock();
            *self.state.write() = UpdaterState::Stopped;
            task.take()
        };

        if let Some(task) = task {
            let _ = task.shutdown_tx.send(());
            if let Err(e) = task.handle.await {
                warn!(error = %e, "FX rate scheduler task ended abnormally");
            }
            info!("FX rate scheduler stopped");
        }
    }
}

async fn run_schedule(
    inner: Arc<UpdaterInner>,
    period: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
    ready_tx: oneshot::Sender<()>,
) {
    let mut ready_tx = Some(ready_tx);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            _ = async {
                ticker.tick().await;
                inner.tick().await;
            } => {
                if let Some(tx) = ready_tx.take() {
                    let _ = tx.send(());
                }
            }
        }
    }
}

impl Drop for RateUpdater {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FxError;
    use crate::provider::MockRateSource;
    use rust_decimal_macros::dec;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store() -> Arc<RateStore> {
        Arc::new(RateStore::new(
            RateSnapshot::new(dec!(18.70), dec!(0.053), RateMode::Static).unwrap(),
        ))
    }

    fn config(mode: RateMode) -> RateUpdaterConfig {
        RateUpdaterConfig {
            mode,
            update_interval: Duration::from_millis(40),
            random_values: vec![dec!(18.50), dec!(18.90), dec!(19.00)],
            api: ApiProviderConfig {
                url: "http://127.0.0.1:9/unused".to_string(),
                api_key: None,
                timeout: Duration::from_millis(100),
            },
        }
    }

    #[tokio::test]
    async fn test_static_mode_never_starts() {
        let store = store();
        let updater = RateUpdater::from_config(&config(RateMode::Static), store.clone()).unwrap();

        assert!(!updater.start().await);
        assert_eq!(updater.state(), UpdaterState::Stopped);
        assert_eq!(updater.tick().await, TickOutcome::Skipped);
        assert_eq!(store.get_rates().mode, RateMode::Static);
        assert_eq!(store.get_rates().usd_to_mxn, dec!(18.70));
    }

    #[tokio::test]
    async fn test_random_mode_start_stop() {
        let store = store();
        let config = config(RateMode::Random);
        let updater = RateUpdater::from_config(&config, store.clone()).unwrap();

        assert!(updater.start().await);
        assert_eq!(updater.state(), UpdaterState::Running);
        assert!(!updater.start().await);

        // Immediate tick already applied a candidate value.
        let rates = store.get_rates();
        assert_eq!(rates.mode, RateMode::Random);
        assert!(config.random_values.contains(&rates.usd_to_mxn));

        tokio::time::sleep(Duration::from_millis(150)).await;
        let rates = store.get_rates();
        assert!(config.random_values.contains(&rates.usd_to_mxn));
        assert_eq!(
            rates.mxn_to_usd,
            fxwallet_common::round_rate(Decimal::ONE / rates.usd_to_mxn)
        );
        assert!(updater.stats().ticks_applied >= 2);

        updater.stop().await;
        assert_eq!(updater.state(), UpdaterState::Stopped);

        let applied = updater.stats().ticks_applied;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(updater.stats().ticks_applied, applied);
    }

    #[tokio::test]
    async fn test_failed_tick_keeps_previous_snapshot() {
        let store = store();
        let source = Arc::new(MockRateSource::new(
            RateMode::Api,
            vec![
                Ok(dec!(17.50)),
                Err(FxError::Timeout("slow".into())),
                Err(FxError::MalformedResponse("garbage".into())),
                Ok(dec!(0)),
            ],
        ));
        let updater = RateUpdater::with_source(store.clone(), source, Duration::from_secs(60));

        assert!(matches!(updater.tick().await, TickOutcome::Applied(_)));
        let applied = store.get_rates();
        assert_eq!(applied.usd_to_mxn, dec!(17.50));

        for _ in 0..3 {
            assert_eq!(updater.tick().await, TickOutcome::Skipped);
            assert_eq!(store.get_rates(), applied);
        }

        assert_eq!(
            updater.stats(),
            UpdaterStats {
                ticks_applied: 1,
                ticks_skipped: 3
            }
        );
    }

    #[tokio::test]
    async fn test_schedule_survives_failing_ticks() {
        let store = store();
        let source = Arc::new(MockRateSource::new(
            RateMode::Api,
            vec![
                Err(FxError::ProviderError("down".into())),
                Err(FxError::ProviderError("down".into())),
                Ok(dec!(18.25)),
            ],
        ));
        let updater = RateUpdater::with_source(store.clone(), source, Duration::from_millis(20));

        assert!(updater.start().await);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(updater.state(), UpdaterState::Running);
        assert_eq!(store.get_rates().usd_to_mxn, dec!(18.25));
        updater.stop().await;
    }

    #[tokio::test]
    async fn test_api_timeout_leaves_snapshot_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"rates":{"MXN":17.0}}"#)
                    .set_delay(Duration::from_millis(400)),
            )
            .mount(&server)
            .await;

        let store = store();
        let before = store.get_rates();
        let mut config = config(RateMode::Api);
        config.api.url = format!("{}/latest/USD", server.uri());
        config.api.timeout = Duration::from_millis(50);

        let updater = RateUpdater::from_config(&config, store.clone()).unwrap();
        assert_eq!(updater.tick().await, TickOutcome::Skipped);
        assert_eq!(store.get_rates(), before);
    }

    #[tokio::test]
    async fn test_api_mode_applies_fetched_rate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"rates":{"MXN":20}}"#))
            .mount(&server)
            .await;

        let store = store();
        let mut config = config(RateMode::Api);
        config.api.url = format!("{}/latest/USD", server.uri());

        let updater = RateUpdater::from_config(&config, store.clone()).unwrap();
        assert!(updater.start().await);

        let rates = store.get_rates();
        assert_eq!(rates.mode, RateMode::Api);
        assert_eq!(rates.usd_to_mxn, dec!(20));
        assert_eq!(rates.mxn_to_usd, dec!(0.05));
        updater.stop().await;
    }

    #[tokio::test]
    async fn test_stop_during_slow_first_tick() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"rates":{"MXN":17.0}}"#)
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let store = store();
        let before = store.get_rates();
        let mut config = config(RateMode::Api);
        config.api.url = format!("{}/latest/USD", server.uri());
        config.api.timeout = Duration::from_secs(10);
        let updater = RateUpdater::from_config(&config, store.clone()).unwrap();

        let started = std::time::Instant::now();
        let (scheduled, ()) = tokio::join!(updater.start(), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            updater.stop().await;
        });

        assert!(!scheduled);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(updater.state(), UpdaterState::Stopped);
        assert_eq!(store.get_rates(), before);
        assert_eq!(updater.stats(), UpdaterStats::default());

        // A later start schedules normally.
        server.reset().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"rates":{"MXN":19}}"#))
            .mount(&server)
            .await;
        assert!(updater.start().await);
        assert_eq!(store.get_rates().usd_to_mxn, dec!(19));
        updater.stop().await;
    }

    #[test]
    fn test_random_mode_requires_candidates() {
        let mut config = config(RateMode::Random);
        config.random_values.clear();
        assert!(matches!(
            RateUpdater::from_config(&config, store()),
            Err(FxError::NoCandidates)
        ));
    }
}
