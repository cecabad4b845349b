//! Mock implementations for testing.

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use crate::domain::{
    AppError, Anchor, BalanceRefresher, BlockchainError, Commitment, ConfirmationOutcome,
    ConfirmationRequest, ExternalServiceError, LedgerClient, PriceQuoteSource, SendOptions,
    TransferTransaction, WalletError, WalletProvider,
};
use crate::infra::blockchain::SolanaRpcProvider;

/// Mock price source replaying a scripted sequence of results.
/// The last entry repeats once the script is exhausted.
pub struct MockPriceSource {
    script: Mutex<VecDeque<Result<f64, String>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockPriceSource {
    #[must_use]
    pub fn new(rate: f64) -> Self {
        Self::with_rates(vec![Ok(rate)])
    }

    #[must_use]
    pub fn with_rates(rates: Vec<Result<f64, String>>) -> Self {
        Self {
            script: Mutex::new(rates.into()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_result(&self) -> Result<f64, String> {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script
                .front()
                .cloned()
                .unwrap_or_else(|| Err("no rate scripted".to_string()))
        }
    }
}

#[async_trait]
impl PriceQuoteSource for MockPriceSource {
    async fn fetch_rate(&self) -> Result<f64, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = self.next_result();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        result.map_err(|msg| AppError::ExternalService(ExternalServiceError::Network(msg)))
    }
}

/// Mock ledger with configurable balance, anchor and confirmation behavior
pub struct MockLedgerClient {
    balance: Mutex<Result<u64, String>>,
    balance_delay: Option<Duration>,
    anchor: Mutex<Result<Anchor, String>>,
    confirm: Mutex<Result<ConfirmationOutcome, String>>,
    balance_gate: Mutex<Option<Arc<Notify>>>,
    anchor_gate: Mutex<Option<Arc<Notify>>>,
    confirm_gate: Mutex<Option<Arc<Notify>>>,
    balance_calls: AtomicUsize,
    anchor_calls: AtomicUsize,
    confirm_calls: AtomicUsize,
}

impl MockLedgerClient {
    #[must_use]
    pub fn with_balance(lamports: u64) -> Self {
        Self {
            balance: Mutex::new(Ok(lamports)),
            balance_delay: None,
            anchor: Mutex::new(Ok(Anchor {
                blockhash: "EkSnNWid2cvwEVnVx9aBqawnmiCNiDgp3gUdkDPTKN1N".to_string(),
                last_valid_block_height: 1_000,
            })),
            confirm: Mutex::new(Ok(ConfirmationOutcome::Confirmed)),
            balance_gate: Mutex::new(None),
            anchor_gate: Mutex::new(None),
            confirm_gate: Mutex::new(None),
            balance_calls: AtomicUsize::new(0),
            anchor_calls: AtomicUsize::new(0),
            confirm_calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_balance_delay(mut self, delay: Duration) -> Self {
        self.balance_delay = Some(delay);
        self
    }

    pub fn set_balance(&self, lamports: u64) {
        *self.balance.lock().unwrap() = Ok(lamports);
    }

    pub fn fail_balance(&self, message: impl Into<String>) {
        *self.balance.lock().unwrap() = Err(message.into());
    }

    pub fn fail_anchor(&self, message: impl Into<String>) {
        *self.anchor.lock().unwrap() = Err(message.into());
    }

    pub fn set_confirm_outcome(&self, outcome: ConfirmationOutcome) {
        *self.confirm.lock().unwrap() = Ok(outcome);
    }

    pub fn fail_confirm(&self, message: impl Into<String>) {
        *self.confirm.lock().unwrap() = Err(message.into());
    }

    /// Hold each `get_balance` call until the returned handle is notified
    pub fn gate_balance(&self) -> Arc<Notify> {
        install_gate(&self.balance_gate)
    }

    /// Hold each `get_latest_anchor` call until the returned handle is notified
    pub fn gate_anchor(&self) -> Arc<Notify> {
        install_gate(&self.anchor_gate)
    }

    /// Hold `confirm` until the returned handle is notified
    pub fn gate_confirmation(&self) -> Arc<Notify> {
        install_gate(&self.confirm_gate)
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn anchor_calls(&self) -> usize {
        self.anchor_calls.load(Ordering::SeqCst)
    }

    pub fn confirm_calls(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.balance_calls() + self.anchor_calls() + self.confirm_calls()
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn get_balance(
        &self,
        _address: &Pubkey,
        _commitment: Commitment,
    ) -> Result<u64, AppError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        pass_gate(&self.balance_gate).await;
        if let Some(delay) = self.balance_delay {
            tokio::time::sleep(delay).await;
        }
        self.balance
            .lock()
            .unwrap()
            .clone()
            .map_err(|msg| AppError::Blockchain(BlockchainError::Connection(msg)))
    }

    async fn get_latest_anchor(&self, _commitment: Commitment) -> Result<Anchor, AppError> {
        self.anchor_calls.fetch_add(1, Ordering::SeqCst);
        pass_gate(&self.anchor_gate).await;
        self.anchor
            .lock()
            .unwrap()
            .clone()
            .map_err(|msg| AppError::Blockchain(BlockchainError::RpcError(msg)))
    }

    async fn confirm(
        &self,
        _request: &ConfirmationRequest,
        _commitment: Commitment,
    ) -> Result<ConfirmationOutcome, AppError> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        pass_gate(&self.confirm_gate).await;
        self.confirm
            .lock()
            .unwrap()
            .clone()
            .map_err(|msg| AppError::Blockchain(BlockchainError::TransactionFailed(msg)))
    }
}

fn install_gate(slot: &Mutex<Option<Arc<Notify>>>) -> Arc<Notify> {
    let gate = Arc::new(Notify::new());
    *slot.lock().unwrap() = Some(Arc::clone(&gate));
    gate
}

async fn pass_gate(slot: &Mutex<Option<Arc<Notify>>>) {
    let gate = slot.lock().unwrap().clone();
    if let Some(gate) = gate {
        gate.notified().await;
    }
}

/// Mock wallet that records what it was asked to send
pub struct MockWallet {
    address: Mutex<Option<Pubkey>>,
    reject: AtomicBool,
    sent: Mutex<Vec<TransferTransaction>>,
    last_options: Mutex<Option<SendOptions>>,
}

impl MockWallet {
    #[must_use]
    pub fn connected(address: Pubkey) -> Self {
        Self {
            address: Mutex::new(Some(address)),
            reject: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            last_options: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn disconnected() -> Self {
        let wallet = Self::connected(Pubkey::default());
        *wallet.address.lock().unwrap() = None;
        wallet
    }

    /// Decline every signing request
    #[must_use]
    pub fn rejecting(self) -> Self {
        self.reject.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_address(&self, address: Option<Pubkey>) {
        *self.address.lock().unwrap() = address;
    }

    pub fn sent_transactions(&self) -> Vec<TransferTransaction> {
        self.sent.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last_send_options(&self) -> Option<SendOptions> {
        *self.last_options.lock().unwrap()
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    fn current_address(&self) -> Option<Pubkey> {
        *self.address.lock().unwrap()
    }

    async fn sign_and_send(
        &self,
        transaction: &TransferTransaction,
        options: &SendOptions,
    ) -> Result<String, AppError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(AppError::Wallet(WalletError::SigningRejected));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(transaction.clone());
        *self.last_options.lock().unwrap() = Some(*options);
        let signature = bs58::encode(format!("sig_{}", sent.len())).into_string();
        Ok(signature)
    }
}

/// Counts refresh requests
#[derive(Default)]
pub struct MockBalanceRefresher {
    refreshes: AtomicUsize,
}

impl MockBalanceRefresher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceRefresher for MockBalanceRefresher {
    async fn refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct RpcScript {
    responses: HashMap<String, VecDeque<Result<serde_json::Value, AppError>>>,
    calls: Vec<(String, serde_json::Value)>,
}

/// Scripted JSON-RPC provider, keyed by method.
///
/// Responses are consumed in order; a final `Ok` response repeats.
/// Clones share the same script.
#[derive(Clone, Default)]
pub struct MockRpcProvider {
    script: Arc<Mutex<RpcScript>>,
}

impl MockRpcProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, method: &str, result: serde_json::Value) {
        self.push(method, Ok(result));
    }

    pub fn push_error(&self, method: &str, error: AppError) {
        self.push(method, Err(error));
    }

    fn push(&self, method: &str, response: Result<serde_json::Value, AppError>) {
        self.script
            .lock()
            .unwrap()
            .responses
            .entry(method.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    pub fn last_params(&self, method: &str) -> Option<serde_json::Value> {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
    }
}

#[async_trait]
impl SolanaRpcProvider for MockRpcProvider {
    async fn send_request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, AppError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push((method.to_string(), params));

        let queue = script.responses.entry(method.to_string()).or_default();
        let repeat_last = queue.len() == 1 && matches!(queue.front(), Some(Ok(_)));
        if repeat_last {
            if let Some(Ok(value)) = queue.front() {
                return Ok(value.clone());
            }
        }
        queue.pop_front().unwrap_or_else(|| {
            Err(AppError::Blockchain(BlockchainError::RpcError(format!(
                "No mock response for {}",
                method
            ))))
        })
    }
}
