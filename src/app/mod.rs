//! Application layer: recipient validation, background feeds and the tip
//! state machine.

pub mod balance;
pub mod engine;
pub mod orchestrator;
pub mod price_feed;
pub mod task;
pub mod validator;

pub use balance::{BalancePoller, BalancePollerConfig};
pub use engine::{EngineConfig, TipEngine};
pub use orchestrator::{OrchestratorConfig, TransactionOrchestrator};
pub use price_feed::{PriceFeedConfig, PriceFeedPoller};
pub use task::{CancelToken, PeriodicTask};
pub use validator::{RecipientInput, parse_recipient, validate_recipient};
