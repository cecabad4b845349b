//! Fiat exchange-rate sources.

pub mod coingecko;

pub use coingecko::{CoinGeckoPriceSource, DEFAULT_PRICE_API_URL, DEFAULT_PRICE_ASSET_ID};
