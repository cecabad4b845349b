//! Error types for collaborators and for the tip state machine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Substring the ledger uses when a transaction's anchor has expired.
pub const EXPIRY_PATTERN: &str = "block height exceeded";

/// Umbrella error returned by external collaborators
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Blockchain(#[from] BlockchainError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    ExternalService(#[from] ExternalServiceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Not supported: {0}")]
    NotSupported(String),
}

/// Input rejected before any network call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Connect a wallet first")]
    NoConnectedAccount,

    #[error("Enter a valid amount")]
    InvalidAmount,

    #[error("Invalid recipient address")]
    InvalidRecipient,
}

#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("User rejected the request.")]
    SigningRejected,

    #[error("Signer mismatch: wallet is {wallet}, transfer is from {from}")]
    SignerMismatch { wallet: String, from: String },

    #[error("Failed to encode transaction: {0}")]
    Encoding(String),
}

#[derive(Debug, Error)]
pub enum ExternalServiceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status_code}: {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(String),

    #[error("Invalid configuration value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Classification stored on a failed [`TransactionStatus`](super::TransactionStatus)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    InsufficientBalance,
    Submission,
    Expired,
    Unknown,
}

/// Why a tip attempt ended in `Failed`. Every variant's `Display` is the
/// user-facing message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TipError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Insufficient balance. You have {balance_sol:.4} SOL")]
    InsufficientBalance { balance_sol: f64 },

    #[error("{0}")]
    Submission(String),

    #[error("Transaction expired. Please try again.")]
    Expired,

    #[error("{0}")]
    Unknown(String),
}

impl TipError {
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Validation(_) => FailureKind::Validation,
            Self::InsufficientBalance { .. } => FailureKind::InsufficientBalance,
            Self::Submission(_) => FailureKind::Submission,
            Self::Expired => FailureKind::Expired,
            Self::Unknown(_) => FailureKind::Unknown,
        }
    }

    /// Classify a collaborator failure raised while sending.
    #[must_use]
    pub fn from_submission(err: &AppError) -> Self {
        let msg = err.to_string();
        if is_expiry_message(&msg) {
            return Self::Expired;
        }
        Self::Submission(msg)
    }

    /// Classify a collaborator failure raised while waiting for confirmation.
    #[must_use]
    pub fn from_confirmation(err: &AppError) -> Self {
        let msg = err.to_string();
        if is_expiry_message(&msg) {
            return Self::Expired;
        }
        match err {
            AppError::Blockchain(BlockchainError::TransactionFailed(_)) => Self::Submission(msg),
            _ => Self::Unknown(msg),
        }
    }
}

#[must_use]
pub fn is_expiry_message(message: &str) -> bool {
    message.to_lowercase().contains(EXPIRY_PATTERN)
}
