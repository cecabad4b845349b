//! Tip transaction state machine.
//!
//! `Idle -> Validating -> PrecheckingBalance -> Submitting -> Confirming ->
//! Succeeded | Failed`. Every failure is recovered into a `Failed` status
//! carrying a user-facing message; nothing is returned as an error.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::validator::parse_recipient;
use crate::domain::{
    BalanceRefresher, Commitment, ConfirmationOutcome, ConfirmationRequest, LedgerClient,
    SendOptions, TipError, TransactionPhase, TransactionStatus, TransferInstruction,
    TransferIntent, TransferTransaction, ValidationError, WalletProvider, lamports_to_sol,
    sol_to_lamports,
};

/// Reserve kept on top of the transfer to approximate the network fee
pub const DEFAULT_FEE_BUFFER_LAMPORTS: u64 = 5_000;

/// Default node-side rebroadcast attempts
pub const DEFAULT_SEND_MAX_RETRIES: usize = 3;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub fee_buffer_lamports: u64,
    pub send_max_retries: usize,
    pub commitment: Commitment,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fee_buffer_lamports: DEFAULT_FEE_BUFFER_LAMPORTS,
            send_max_retries: DEFAULT_SEND_MAX_RETRIES,
            commitment: Commitment::Confirmed,
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        use std::env;

        let fee_buffer_lamports = env::var("TIP_FEE_BUFFER_LAMPORTS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_FEE_BUFFER_LAMPORTS);

        let send_max_retries = env::var("TIP_SEND_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_SEND_MAX_RETRIES);

        Self {
            fee_buffer_lamports,
            send_max_retries,
            ..Default::default()
        }
    }

    fn send_options(&self) -> SendOptions {
        SendOptions {
            skip_preflight: true,
            max_retries: self.send_max_retries,
            preflight_commitment: self.commitment,
        }
    }
}

/// Drives one tip at a time from validation to confirmation
pub struct TransactionOrchestrator {
    wallet: Arc<dyn WalletProvider>,
    ledger: Arc<dyn LedgerClient>,
    on_success: Arc<dyn BalanceRefresher>,
    config: OrchestratorConfig,
    status_tx: watch::Sender<TransactionStatus>,
}

impl TransactionOrchestrator {
    #[must_use]
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        ledger: Arc<dyn LedgerClient>,
        on_success: Arc<dyn BalanceRefresher>,
        config: OrchestratorConfig,
    ) -> Self {
        let (status_tx, _) = watch::channel(TransactionStatus::idle());
        Self {
            wallet,
            ledger,
            on_success,
            config,
            status_tx,
        }
    }

    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        self.status_tx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TransactionStatus> {
        self.status_tx.subscribe()
    }

    /// Run a tip to a terminal status.
    ///
    /// Returns `None` without touching anything when another tip is still in
    /// flight; otherwise the terminal status.
    pub async fn submit(&self, intent: &TransferIntent) -> Option<TransactionStatus> {
        let attempt_id = Uuid::new_v4();
        let started = self.status_tx.send_if_modified(|status| {
            if !status.phase.accepts_submit() {
                return false;
            }
            *status = TransactionStatus::started(attempt_id);
            true
        });
        if !started {
            warn!(phase = %self.status().phase, "Submit ignored: a tip is already in flight");
            return None;
        }

        match self.run(attempt_id, intent).await {
            Ok((signature, summary)) => {
                info!(attempt = %attempt_id, signature = %signature, "Tip confirmed");
                self.status_tx
                    .send_modify(|status| status.succeed(signature, summary));
                self.on_success.refresh().await;
            }
            Err(e) => {
                warn!(attempt = %attempt_id, kind = ?e.kind(), error = %e, "Tip failed");
                self.status_tx.send_modify(|status| status.fail(&e));
            }
        }

        Some(self.status())
    }

    /// Return a terminal status to `Idle`. In-flight tips are not affected.
    pub fn dismiss(&self) {
        self.status_tx.send_if_modified(|status| {
            if !status.phase.is_terminal() {
                return false;
            }
            *status = TransactionStatus::idle();
            true
        });
    }

    #[instrument(skip(self, intent), fields(recipient = %intent.recipient, native = %intent.native_amount))]
    async fn run(
        &self,
        attempt_id: Uuid,
        intent: &TransferIntent,
    ) -> Result<(String, String), TipError> {
        // Validating
        let sender = self
            .wallet
            .current_address()
            .ok_or(ValidationError::NoConnectedAccount)?;
        if !intent.native_amount.is_finite() || intent.native_amount <= 0.0 {
            return Err(ValidationError::InvalidAmount.into());
        }
        let lamports = sol_to_lamports(intent.native_amount)
            .filter(|l| *l > 0)
            .ok_or(ValidationError::InvalidAmount)?;
        let recipient =
            parse_recipient(&intent.recipient).ok_or(ValidationError::InvalidRecipient)?;

        // PrecheckingBalance
        self.advance(TransactionPhase::PrecheckingBalance, "Checking balance...");
        match self.ledger.get_balance(&sender, self.config.commitment).await {
            Ok(balance) => {
                let required = lamports.saturating_add(self.config.fee_buffer_lamports);
                if balance < required {
                    return Err(TipError::InsufficientBalance {
                        balance_sol: lamports_to_sol(balance),
                    });
                }
            }
            Err(e) => {
                // The ledger rejects overdrafts itself.
                warn!(attempt = %attempt_id, error = %e, "Balance precheck failed, submitting anyway");
            }
        }

        // Submitting
        self.advance(TransactionPhase::Submitting, "Sending transaction...");
        let anchor = self
            .ledger
            .get_latest_anchor(self.config.commitment)
            .await
            .map_err(|e| TipError::from_submission(&e))?;
        let transaction = TransferTransaction {
            instruction: TransferInstruction {
                from: sender,
                to: recipient,
                lamports,
            },
            anchor,
        };
        let signature = self
            .wallet
            .sign_and_send(&transaction, &self.config.send_options())
            .await
            .map_err(|e| {
                error!(attempt = %attempt_id, error = %e, "Transaction submission failed");
                TipError::from_submission(&e)
            })?;
        info!(attempt = %attempt_id, signature = %signature, lamports = %lamports, "Transaction sent");

        // Confirming
        self.advance(TransactionPhase::Confirming, "Confirming...");
        let request = ConfirmationRequest {
            signature: signature.clone(),
            anchor: transaction.anchor,
        };
        let outcome = self
            .ledger
            .confirm(&request, self.config.commitment)
            .await
            .map_err(|e| TipError::from_confirmation(&e))?;
        if outcome == ConfirmationOutcome::Expired {
            return Err(TipError::Expired);
        }

        let summary = format!(
            "Sent ${} ({:.4} SOL)",
            intent.fiat_text, intent.native_amount
        );
        Ok((signature, summary))
    }

    fn advance(&self, phase: TransactionPhase, message: &str) {
        self.status_tx
            .send_modify(|status| status.advance(phase, Some(message)));
    }
}
