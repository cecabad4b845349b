//! Domain layer containing core types, collaborator traits, and error definitions.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{
    AppError, BlockchainError, ConfigError, ExternalServiceError, FailureKind, TipError,
    ValidationError, WalletError,
};
pub use traits::{BalanceRefresher, LedgerClient, PriceQuoteSource, WalletProvider};
pub use types::{
    AddressValidity, Anchor, BalanceSnapshot, Commitment, ConfirmationOutcome,
    ConfirmationRequest, ExchangeRate, LAMPORTS_PER_SOL, SendOptions, TransactionPhase,
    TransactionStatus, TransferInstruction, TransferIntent, TransferTransaction, lamports_to_sol,
    sol_to_lamports,
};
