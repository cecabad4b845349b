//! Keypair-backed wallet.
//!
//! Builds the single system-program transfer, signs it locally and submits
//! it with `sendTransaction`. The private key never leaves this type.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::SigningKey;
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signer::{Signer as SolanaSigner, keypair::Keypair},
    transaction::Transaction,
};
use solana_system_interface::instruction as system_instruction;
use tracing::{info, instrument};

use super::solana::SolanaRpcProvider;
use crate::domain::{
    AppError, BlockchainError, SendOptions, TransferTransaction, WalletError, WalletProvider,
};

pub struct KeypairWallet {
    keypair: Keypair,
    provider: Arc<dyn SolanaRpcProvider>,
}

impl KeypairWallet {
    pub fn new(
        signing_key: &SigningKey,
        provider: Arc<dyn SolanaRpcProvider>,
    ) -> Result<Self, AppError> {
        let keypair_bytes = signing_key.to_keypair_bytes();
        let keypair = Keypair::try_from(keypair_bytes.as_slice()).map_err(|e| {
            AppError::Blockchain(BlockchainError::InvalidKey(format!(
                "Failed to create keypair: {}",
                e
            )))
        })?;

        info!(address = %keypair.pubkey(), "Wallet loaded");
        Ok(Self { keypair, provider })
    }

    #[must_use]
    pub fn address(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Build and sign the transfer without sending it
    pub fn sign_transaction(&self, transfer: &TransferTransaction) -> Result<Transaction, AppError> {
        let wallet = self.keypair.pubkey();
        if *transfer.fee_payer() != wallet {
            return Err(AppError::Wallet(WalletError::SignerMismatch {
                wallet: wallet.to_string(),
                from: transfer.fee_payer().to_string(),
            }));
        }

        let recent_blockhash = Hash::from_str(&transfer.anchor.blockhash).map_err(|e| {
            AppError::Wallet(WalletError::Encoding(format!(
                "Invalid blockhash {}: {}",
                transfer.anchor.blockhash, e
            )))
        })?;

        let instruction = &transfer.instruction;
        let transfer_ix =
            system_instruction::transfer(&instruction.from, &instruction.to, instruction.lamports);

        Ok(Transaction::new_signed_with_payer(
            &[transfer_ix],
            Some(&wallet),
            &[&self.keypair],
            recent_blockhash,
        ))
    }
}

#[async_trait]
impl WalletProvider for KeypairWallet {
    fn current_address(&self) -> Option<Pubkey> {
        Some(self.keypair.pubkey())
    }

    #[instrument(skip(self, transfer), fields(to = %transfer.instruction.to, lamports = %transfer.instruction.lamports))]
    async fn sign_and_send(
        &self,
        transfer: &TransferTransaction,
        options: &SendOptions,
    ) -> Result<String, AppError> {
        let transaction = self.sign_transaction(transfer)?;
        let wire = bincode::serialize(&transaction)
            .map_err(|e| AppError::Wallet(WalletError::Encoding(e.to_string())))?;

        let params = serde_json::json!([
            BASE64.encode(wire),
            {
                "encoding": "base64",
                "skipPreflight": options.skip_preflight,
                "preflightCommitment": options.preflight_commitment.as_str(),
                "maxRetries": options.max_retries,
            }
        ]);

        let result = self.provider.send_request("sendTransaction", params).await?;
        let signature: String = serde_json::from_value(result).map_err(|e| {
            AppError::Blockchain(BlockchainError::RpcError(format!(
                "Deserialization error: {}",
                e
            )))
        })?;

        info!(signature = %signature, "Transaction submitted");
        Ok(signature)
    }
}
