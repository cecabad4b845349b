//! Cancellable periodic background task.
//!
//! The task fires immediately and then on a fixed schedule. Each tick's job
//! is spawned on its own so a slow fetch never shifts the schedule. Jobs
//! receive a [`CancelToken`] and must check it before every externally
//! visible write; cancelling never aborts a job that is already running.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle to a running periodic task. Dropping it cancels the task.
#[derive(Debug)]
pub struct PeriodicTask {
    token: CancelToken,
    shutdown_tx: watch::Sender<bool>,
}

impl PeriodicTask {
    /// Spawn `job` now and then every `period`.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, job: F) -> Self
    where
        F: Fn(CancelToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancelToken::new();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let loop_token = token.clone();
        let period = period.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(task = name, period_ms = %period.as_millis(), "Periodic task started");

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = interval.tick() => {
                        if loop_token.is_cancelled() {
                            break;
                        }
                        tokio::spawn(job(loop_token.clone()));
                    }
                }
            }

            debug!(task = name, "Periodic task stopped");
        });

        Self {
            token,
            shutdown_tx,
        }
    }

    #[must_use]
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
