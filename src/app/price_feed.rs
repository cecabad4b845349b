//! Background exchange-rate feed.
//!
//! Fetches the native-asset/fiat rate immediately on activation and then on
//! a fixed interval. A failed refresh marks the snapshot stale but keeps the
//! last known good value.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::task::{CancelToken, PeriodicTask};
use crate::domain::{ExchangeRate, PriceQuoteSource};

/// Default refresh period for the price feed
pub const DEFAULT_PRICE_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct PriceFeedConfig {
    pub interval: Duration,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_PRICE_POLL_INTERVAL,
        }
    }
}

impl PriceFeedConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let interval = std::env::var("PRICE_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PRICE_POLL_INTERVAL);

        Self { interval }
    }
}

/// Owns the [`ExchangeRate`] snapshot
pub struct PriceFeedPoller {
    source: Arc<dyn PriceQuoteSource>,
    config: PriceFeedConfig,
    rate_tx: Arc<watch::Sender<ExchangeRate>>,
    task: Mutex<Option<PeriodicTask>>,
}

impl PriceFeedPoller {
    #[must_use]
    pub fn new(source: Arc<dyn PriceQuoteSource>, config: PriceFeedConfig) -> Self {
        let (rate_tx, _) = watch::channel(ExchangeRate::default());
        Self {
            source,
            config,
            rate_tx: Arc::new(rate_tx),
            task: Mutex::new(None),
        }
    }

    /// Start polling. Does nothing if already active.
    pub fn activate(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return;
        }

        let source = Arc::clone(&self.source);
        let rate_tx = Arc::clone(&self.rate_tx);
        *task = Some(PeriodicTask::spawn(
            "price_feed",
            self.config.interval,
            move |token| {
                let source = Arc::clone(&source);
                let rate_tx = Arc::clone(&rate_tx);
                async move { refresh_rate(source.as_ref(), &rate_tx, &token).await }
            },
        ));
        info!(interval_secs = %self.config.interval.as_secs(), "Price feed activated");
    }

    /// Stop polling. Fetches already in flight will not write.
    pub fn deactivate(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.cancel();
            info!("Price feed deactivated");
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    #[must_use]
    pub fn snapshot(&self) -> ExchangeRate {
        self.rate_tx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ExchangeRate> {
        self.rate_tx.subscribe()
    }
}

impl Drop for PriceFeedPoller {
    fn drop(&mut self) {
        self.deactivate();
    }
}

async fn refresh_rate(
    source: &dyn PriceQuoteSource,
    rate_tx: &watch::Sender<ExchangeRate>,
    token: &CancelToken,
) {
    let result = source.fetch_rate().await;

    // The cancel check runs under the channel's write lock.
    rate_tx.send_if_modified(|rate| {
        if token.is_cancelled() {
            return false;
        }
        match &result {
            Ok(value) => {
                if rate.value.is_none() {
                    info!(rate = %value, "Received first exchange rate");
                } else {
                    debug!(rate = %value, "Exchange rate refreshed");
                }
                rate.value = Some(*value);
                rate.stale = false;
                rate.updated_at = Some(Utc::now());
            }
            Err(e) => {
                warn!(error = %e, last_known = ?rate.value, "Exchange rate refresh failed");
                rate.stale = true;
            }
        }
        rate.loading = false;
        true
    });
}
