//! Test utilities: mock collaborators for the pollers and the orchestrator.

pub mod mocks;

pub use mocks::{
    MockBalanceRefresher, MockLedgerClient, MockPriceSource, MockRpcProvider, MockWallet,
};
