//! Solana ledger access and the local keypair wallet.

pub mod solana;
pub mod wallet;

pub use solana::{
    HttpSolanaRpcProvider, RpcClientConfig, RpcLedgerClient, SolanaRpcProvider,
    signing_key_from_base58,
};
pub use wallet::KeypairWallet;
