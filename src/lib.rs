//! Fiat-denominated SOL tipping engine.
//!
//! The crate is split the usual way: `domain` holds types, collaborator
//! traits and errors, `app` holds the pollers and the transaction state
//! machine, and `infra` holds the RPC, wallet and price-quote
//! implementations.

pub mod app;
pub mod domain;
pub mod infra;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
