//! Infrastructure layer implementations.

pub mod blockchain;
pub mod price;

pub use blockchain::{
    HttpSolanaRpcProvider, KeypairWallet, RpcClientConfig, RpcLedgerClient, SolanaRpcProvider,
    signing_key_from_base58,
};
pub use price::CoinGeckoPriceSource;
