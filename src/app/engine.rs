//! Wiring of the pollers and the orchestrator behind one handle.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use super::balance::{BalancePoller, BalancePollerConfig};
use super::orchestrator::{OrchestratorConfig, TransactionOrchestrator};
use super::price_feed::{PriceFeedConfig, PriceFeedPoller};
use super::validator::validate_recipient;
use crate::domain::{
    AddressValidity, BalanceSnapshot, ExchangeRate, LedgerClient, PriceQuoteSource,
    TransactionStatus, TransferIntent, WalletProvider,
};

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub price_feed: PriceFeedConfig,
    pub balance: BalancePollerConfig,
    pub orchestrator: OrchestratorConfig,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            price_feed: PriceFeedConfig::from_env(),
            balance: BalancePollerConfig::from_env(),
            orchestrator: OrchestratorConfig::from_env(),
        }
    }
}

/// Read-only snapshots plus `submit`, `dismiss` and `refresh_balance`
pub struct TipEngine {
    wallet: Arc<dyn WalletProvider>,
    price_feed: Arc<PriceFeedPoller>,
    balances: Arc<BalancePoller>,
    orchestrator: Arc<TransactionOrchestrator>,
}

impl TipEngine {
    #[must_use]
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        ledger: Arc<dyn LedgerClient>,
        quotes: Arc<dyn PriceQuoteSource>,
        config: EngineConfig,
    ) -> Self {
        let price_feed = Arc::new(PriceFeedPoller::new(quotes, config.price_feed));
        let balances = Arc::new(BalancePoller::new(Arc::clone(&ledger), config.balance));
        let orchestrator = Arc::new(TransactionOrchestrator::new(
            Arc::clone(&wallet),
            ledger,
            Arc::clone(&balances) as _,
            config.orchestrator,
        ));
        Self {
            wallet,
            price_feed,
            balances,
            orchestrator,
        }
    }

    /// Start the price feed and follow the wallet's current account.
    pub fn start(&self) {
        self.price_feed.activate();
        self.sync_account();
        info!("Tip engine started");
    }

    /// Re-read the connected account; call after the wallet connects,
    /// disconnects or switches accounts.
    pub fn sync_account(&self) {
        self.balances.set_account(self.wallet.current_address());
    }

    pub fn stop(&self) {
        self.price_feed.deactivate();
        self.balances.deactivate();
        info!("Tip engine stopped");
    }

    #[must_use]
    pub fn exchange_rate(&self) -> ExchangeRate {
        self.price_feed.snapshot()
    }

    #[must_use]
    pub fn balance(&self) -> BalanceSnapshot {
        self.balances.snapshot()
    }

    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        self.orchestrator.status()
    }

    #[must_use]
    pub fn recipient_validity(&self, raw: &str) -> AddressValidity {
        validate_recipient(raw)
    }

    /// Intent for the given form text at the current rate
    #[must_use]
    pub fn intent(&self, recipient: &str, fiat_input: &str) -> TransferIntent {
        TransferIntent::from_input(recipient, fiat_input, &self.exchange_rate())
    }

    pub async fn submit(&self, intent: &TransferIntent) -> Option<TransactionStatus> {
        self.orchestrator.submit(intent).await
    }

    pub fn dismiss(&self) {
        self.orchestrator.dismiss();
    }

    pub async fn refresh_balance(&self) {
        self.balances.refresh().await;
    }

    #[must_use]
    pub fn subscribe_rate(&self) -> watch::Receiver<ExchangeRate> {
        self.price_feed.subscribe()
    }

    #[must_use]
    pub fn subscribe_balance(&self) -> watch::Receiver<BalanceSnapshot> {
        self.balances.subscribe()
    }

    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<TransactionStatus> {
        self.orchestrator.subscribe()
    }
}

impl Drop for TipEngine {
    fn drop(&mut self) {
        self.price_feed.deactivate();
        self.balances.deactivate();
    }
}
