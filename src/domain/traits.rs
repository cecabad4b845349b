//! Domain traits defining contracts for external systems.

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;

use super::error::AppError;
use super::types::{
    Anchor, Commitment, ConfirmationOutcome, ConfirmationRequest, SendOptions, TransferTransaction,
};

/// Connected account and its signing capability
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Currently connected account, if any
    fn current_address(&self) -> Option<Pubkey>;

    /// Sign the transfer and hand it to the ledger.
    /// Returns the base58 transaction signature.
    async fn sign_and_send(
        &self,
        transaction: &TransferTransaction,
        options: &SendOptions,
    ) -> Result<String, AppError>;
}

/// Ledger reads and confirmation tracking
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Balance in lamports
    async fn get_balance(&self, address: &Pubkey, commitment: Commitment)
    -> Result<u64, AppError>;

    /// Fresh anchor (recent blockhash) for building a transaction
    async fn get_latest_anchor(&self, commitment: Commitment) -> Result<Anchor, AppError>;

    /// Wait until the signature reaches `commitment` or its anchor expires
    async fn confirm(
        &self,
        request: &ConfirmationRequest,
        commitment: Commitment,
    ) -> Result<ConfirmationOutcome, AppError>;

    /// Current block height
    async fn get_block_height(&self, commitment: Commitment) -> Result<u64, AppError> {
        let _ = commitment;
        Err(AppError::NotSupported(
            "get_block_height not implemented".to_string(),
        ))
    }
}

/// Source of the native-asset/fiat exchange rate
#[async_trait]
pub trait PriceQuoteSource: Send + Sync {
    /// Fetch a single positive rate
    async fn fetch_rate(&self) -> Result<f64, AppError>;
}

/// Out-of-band balance refresh, invoked after a successful transfer
#[async_trait]
pub trait BalanceRefresher: Send + Sync {
    async fn refresh(&self);
}
