//! Background balance feed for the connected account.
//!
//! The snapshot is keyed to one account. Switching accounts cancels the
//! previous loop and resets the snapshot before the new loop starts, so a
//! late response for the old account can never land on the new one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::task::{CancelToken, PeriodicTask};
use crate::domain::{BalanceRefresher, BalanceSnapshot, Commitment, LedgerClient, lamports_to_sol};

/// Default refresh period for the balance feed
pub const DEFAULT_BALANCE_POLL_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct BalancePollerConfig {
    pub interval: Duration,
    pub commitment: Commitment,
}

impl Default for BalancePollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_BALANCE_POLL_INTERVAL,
            commitment: Commitment::Confirmed,
        }
    }
}

impl BalancePollerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let interval = std::env::var("BALANCE_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_BALANCE_POLL_INTERVAL);

        Self {
            interval,
            ..Default::default()
        }
    }
}

struct ActiveAccount {
    address: Pubkey,
    task: PeriodicTask,
}

/// Owns the [`BalanceSnapshot`]
pub struct BalancePoller {
    ledger: Arc<dyn LedgerClient>,
    config: BalancePollerConfig,
    balance_tx: Arc<watch::Sender<BalanceSnapshot>>,
    active: Mutex<Option<ActiveAccount>>,
}

impl BalancePoller {
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerClient>, config: BalancePollerConfig) -> Self {
        let (balance_tx, _) = watch::channel(BalanceSnapshot::default());
        Self {
            ledger,
            config,
            balance_tx: Arc::new(balance_tx),
            active: Mutex::new(None),
        }
    }

    /// Point the poller at `account`, or idle it with `None`.
    ///
    /// Setting the same account again keeps the running loop.
    pub fn set_account(&self, account: Option<Pubkey>) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().map(|a| a.address) == account {
            return;
        }

        if let Some(previous) = active.take() {
            previous.task.cancel();
            debug!(account = %previous.address, "Stopped balance polling");
        }

        self.balance_tx.send_modify(|snapshot| {
            *snapshot = BalanceSnapshot {
                address: account.map(|a| a.to_string()),
                amount: None,
                loading: false,
            };
        });

        let Some(address) = account else {
            info!("Balance feed idle (no connected account)");
            return;
        };

        let ledger = Arc::clone(&self.ledger);
        let balance_tx = Arc::clone(&self.balance_tx);
        let commitment = self.config.commitment;
        let in_flight = Arc::new(AtomicBool::new(false));
        let task = PeriodicTask::spawn("balance", self.config.interval, move |token| {
            let ledger = Arc::clone(&ledger);
            let balance_tx = Arc::clone(&balance_tx);
            let in_flight = Arc::clone(&in_flight);
            async move {
                let Some(_guard) = InFlight::acquire(&in_flight) else {
                    debug!(account = %address, "Previous balance fetch still running, skipping tick");
                    return;
                };
                poll_balance(ledger.as_ref(), &balance_tx, &address, commitment, &token).await;
            }
        });
        *active = Some(ActiveAccount { address, task });
        info!(account = %address, interval_secs = %self.config.interval.as_secs(), "Balance feed activated");
    }

    pub fn deactivate(&self) {
        self.set_account(None);
    }

    #[must_use]
    pub fn current_account(&self) -> Option<Pubkey> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|a| a.address)
    }

    /// One immediate fetch outside the periodic schedule.
    ///
    /// Failures leave the snapshot untouched.
    #[instrument(skip(self))]
    pub async fn refresh(&self) {
        let (address, token) = {
            let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            match active.as_ref() {
                Some(a) => (a.address, a.task.token()),
                None => return,
            }
        };

        match self.ledger.get_balance(&address, self.config.commitment).await {
            Ok(lamports) => {
                self.balance_tx.send_if_modified(|snapshot| {
                    if token.is_cancelled() {
                        return false;
                    }
                    snapshot.amount = Some(lamports_to_sol(lamports));
                    true
                });
                debug!(account = %address, lamports = %lamports, "Balance refreshed");
            }
            Err(e) => {
                warn!(account = %address, error = %e, "Balance refresh failed");
            }
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> BalanceSnapshot {
        self.balance_tx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<BalanceSnapshot> {
        self.balance_tx.subscribe()
    }
}

impl Drop for BalancePoller {
    fn drop(&mut self) {
        let active = self
            .active
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(active) = active {
            active.task.cancel();
        }
    }
}

#[async_trait]
impl BalanceRefresher for BalancePoller {
    async fn refresh(&self) {
        BalancePoller::refresh(self).await;
    }
}

/// Marks the one periodic fetch allowed per account at a time
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        (!flag.swap(true, Ordering::SeqCst)).then_some(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn poll_balance(
    ledger: &dyn LedgerClient,
    balance_tx: &watch::Sender<BalanceSnapshot>,
    address: &Pubkey,
    commitment: Commitment,
    token: &CancelToken,
) {
    balance_tx.send_if_modified(|snapshot| {
        if token.is_cancelled() {
            return false;
        }
        snapshot.loading = true;
        true
    });

    let result = ledger.get_balance(address, commitment).await;

    balance_tx.send_if_modified(|snapshot| {
        if token.is_cancelled() {
            return false;
        }
        match &result {
            Ok(lamports) => snapshot.amount = Some(lamports_to_sol(*lamports)),
            Err(e) => {
                warn!(account = %address, error = %e, "Balance fetch failed");
                snapshot.amount = None;
            }
        }
        snapshot.loading = false;
        true
    });
}
