//! Domain types shared by the pollers, the orchestrator and the collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use uuid::Uuid;

use super::error::{FailureKind, TipError};

/// Smallest units (lamports) per whole SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Explorer used for signature links
pub const EXPLORER_TX_URL: &str = "https://solscan.io/tx";

/// Convert a SOL amount to lamports, rounding half up.
///
/// Returns `None` for non-finite or negative input, or when the result does
/// not fit in a `u64`.
#[must_use]
pub fn sol_to_lamports(sol: f64) -> Option<u64> {
    if !sol.is_finite() || sol < 0.0 {
        return None;
    }
    let lamports = (sol * LAMPORTS_PER_SOL as f64 + 0.5).floor();
    if lamports > u64::MAX as f64 {
        return None;
    }
    Some(lamports as u64)
}

#[must_use]
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Result of checking a recipient string
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AddressValidity {
    /// Nothing typed yet
    #[default]
    Unknown,
    Valid,
    Invalid,
}

/// Native-asset/fiat rate as last observed by the price feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExchangeRate {
    /// Last known good rate; survives failed refreshes
    pub value: Option<f64>,
    /// True until the first fetch resolves
    pub loading: bool,
    /// True when the most recent fetch failed
    pub stale: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for ExchangeRate {
    fn default() -> Self {
        Self {
            value: None,
            loading: true,
            stale: false,
            updated_at: None,
        }
    }
}

/// Spendable balance of the connected account
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BalanceSnapshot {
    /// Account the amount belongs to (base58)
    pub address: Option<String>,
    /// Balance in SOL; `None` means unavailable, not zero
    pub amount: Option<f64>,
    pub loading: bool,
}

/// A tip as the user currently describes it. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferIntent {
    pub recipient: String,
    pub fiat_amount: f64,
    /// Fiat amount as the user typed it, used in the success summary
    pub fiat_text: String,
    pub native_amount: f64,
}

impl TransferIntent {
    /// Build an intent from a parsed fiat amount and the current rate.
    /// Without a rate the native amount is zero.
    #[must_use]
    pub fn new(recipient: impl Into<String>, fiat_amount: f64, rate: &ExchangeRate) -> Self {
        let native_amount = match rate.value {
            Some(value) if value > 0.0 => fiat_amount / value,
            _ => 0.0,
        };
        Self {
            recipient: recipient.into(),
            fiat_amount,
            fiat_text: fiat_amount.to_string(),
            native_amount,
        }
    }

    /// Build an intent from raw form text. Unparsable amounts become zero.
    #[must_use]
    pub fn from_input(recipient: &str, fiat_input: &str, rate: &ExchangeRate) -> Self {
        let fiat_text = fiat_input.trim();
        let fiat_amount = fiat_text.parse::<f64>().unwrap_or(0.0);
        Self {
            fiat_text: fiat_text.to_string(),
            ..Self::new(recipient, fiat_amount, rate)
        }
    }
}

/// Phase of the tip state machine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransactionPhase {
    #[default]
    Idle,
    Validating,
    PrecheckingBalance,
    Submitting,
    Confirming,
    Succeeded,
    Failed,
}

impl TransactionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::PrecheckingBalance => "prechecking_balance",
            Self::Submitting => "submitting",
            Self::Confirming => "confirming",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// A new submit is accepted only from these phases.
    #[must_use]
    pub fn accepts_submit(&self) -> bool {
        matches!(self, Self::Idle | Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for TransactionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observable state of the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionStatus {
    pub phase: TransactionPhase,
    pub message: Option<String>,
    pub signature: Option<String>,
    pub failure: Option<FailureKind>,
    /// Correlates log lines of one submit attempt
    pub attempt_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl Default for TransactionStatus {
    fn default() -> Self {
        Self::idle()
    }
}

impl TransactionStatus {
    #[must_use]
    pub fn idle() -> Self {
        Self {
            phase: TransactionPhase::Idle,
            message: None,
            signature: None,
            failure: None,
            attempt_id: None,
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn started(attempt_id: Uuid) -> Self {
        Self {
            phase: TransactionPhase::Validating,
            attempt_id: Some(attempt_id),
            ..Self::idle()
        }
    }

    pub fn advance(&mut self, phase: TransactionPhase, message: Option<&str>) {
        self.phase = phase;
        self.message = message.map(str::to_string);
        self.updated_at = Utc::now();
    }

    pub fn succeed(&mut self, signature: String, summary: String) {
        self.phase = TransactionPhase::Succeeded;
        self.message = Some(summary);
        self.signature = Some(signature);
        self.failure = None;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, error: &TipError) {
        self.phase = TransactionPhase::Failed;
        self.message = Some(error.to_string());
        self.signature = None;
        self.failure = Some(error.kind());
        self.updated_at = Utc::now();
    }

    #[must_use]
    pub fn explorer_url(&self) -> Option<String> {
        self.signature
            .as_ref()
            .map(|sig| format!("{}/{}", EXPLORER_TX_URL, sig))
    }
}

/// Durability level for reads and confirmation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }

    /// Whether a reported confirmation status satisfies this level.
    #[must_use]
    pub fn is_satisfied_by(&self, status: &str) -> bool {
        match self {
            Self::Processed => matches!(status, "processed" | "confirmed" | "finalized"),
            Self::Confirmed => matches!(status, "confirmed" | "finalized"),
            Self::Finalized => status == "finalized",
        }
    }
}

impl std::fmt::Display for Commitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recent blockhash and the last block height at which it is accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub blockhash: String,
    pub last_valid_block_height: u64,
}

/// Single system-program transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferInstruction {
    pub from: Pubkey,
    pub to: Pubkey,
    pub lamports: u64,
}

/// Everything a wallet needs to build and sign the transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTransaction {
    pub instruction: TransferInstruction,
    pub anchor: Anchor,
}

impl TransferTransaction {
    #[must_use]
    pub fn fee_payer(&self) -> &Pubkey {
        &self.instruction.from
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub skip_preflight: bool,
    /// Node-side rebroadcast attempts
    pub max_retries: usize,
    pub preflight_commitment: Commitment,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            skip_preflight: true,
            max_retries: 3,
            preflight_commitment: Commitment::Confirmed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRequest {
    pub signature: String,
    pub anchor: Anchor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Confirmed,
    /// The anchor's last valid block height passed without inclusion
    Expired,
}
