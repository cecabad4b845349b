//! Application entry point.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use ed25519_dalek::SigningKey;
use secrecy::SecretString;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use solana_tip_engine::app::{EngineConfig, TipEngine};
use solana_tip_engine::domain::{AddressValidity, ConfigError, TransactionPhase};
use solana_tip_engine::infra::{
    CoinGeckoPriceSource, HttpSolanaRpcProvider, KeypairWallet, RpcClientConfig, RpcLedgerClient,
    signing_key_from_base58,
};

const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// Application configuration
struct Config {
    rpc_url: String,
    signing_key: SigningKey,
    /// Price API base URL (optional - uses CoinGecko if not set)
    price_api_url: Option<String>,
    /// One-shot tip target; both fields must be set
    tip_recipient: Option<String>,
    tip_usd_amount: Option<String>,
}

impl Config {
    fn from_env() -> Result<Self> {
        let rpc_url = env::var("SOLANA_RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string());
        if !rpc_url.starts_with("http://") && !rpc_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                key: "SOLANA_RPC_URL".to_string(),
                message: format!("expected an http(s) URL, got {}", rpc_url),
            }
            .into());
        }
        let signing_key = Self::load_signing_key()?;
        let price_api_url = env::var("PRICE_API_URL").ok().filter(|u| !u.is_empty());
        let tip_recipient = env::var("TIP_RECIPIENT").ok().filter(|r| !r.is_empty());
        let tip_usd_amount = env::var("TIP_USD_AMOUNT").ok().filter(|a| !a.is_empty());

        Ok(Self {
            rpc_url,
            signing_key,
            price_api_url,
            tip_recipient,
            tip_usd_amount,
        })
    }

    fn load_signing_key() -> Result<SigningKey> {
        let key_str = env::var("TIPPER_PRIVATE_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::Missing("TIPPER_PRIVATE_KEY".to_string()))
            .context("Set TIPPER_PRIVATE_KEY to a Base58-encoded Solana private key")?;

        let secret = SecretString::from(key_str);
        signing_key_from_base58(&secret).context("Failed to parse TIPPER_PRIVATE_KEY as Base58")
    }

    fn one_shot_tip(&self) -> Option<(&str, &str)> {
        match (&self.tip_recipient, &self.tip_usd_amount) {
            (Some(recipient), Some(amount)) => Some((recipient.as_str(), amount.as_str())),
            _ => None,
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,solana_tip_engine=debug"));

    let json = env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Wait for the first resolved price fetch, then submit one tip
async fn send_one_tip(engine: &TipEngine, recipient: &str, usd_amount: &str) -> Result<()> {
    if engine.recipient_validity(recipient) != AddressValidity::Valid {
        warn!(recipient = %recipient, "TIP_RECIPIENT does not look like a Solana address");
    }

    let mut rates = engine.subscribe_rate();
    let rate = rates
        .wait_for(|rate| !rate.loading)
        .await
        .context("Price feed closed before the first rate arrived")?
        .clone();
    match rate.value {
        Some(value) => info!(rate = value, stale = rate.stale, "SOL/USD rate"),
        None => warn!("No exchange rate available; the tip amount will be rejected"),
    }

    let intent = engine.intent(recipient, usd_amount);
    info!(
        recipient = %intent.recipient,
        usd = intent.fiat_amount,
        sol = intent.native_amount,
        "Submitting tip"
    );

    let Some(status) = engine.submit(&intent).await else {
        anyhow::bail!("A tip is already in flight");
    };

    match status.phase {
        TransactionPhase::Succeeded => {
            info!(
                message = status.message.as_deref().unwrap_or_default(),
                signature = status.signature.as_deref().unwrap_or_default(),
                "Tip confirmed"
            );
            if let Some(url) = status.explorer_url() {
                info!("🔗 {}", url);
            }
            if let Some(amount) = engine.balance().amount {
                info!("💰 Balance after tip: {:.4} SOL", amount);
            }
            Ok(())
        }
        _ => anyhow::bail!(
            "Tip failed ({:?}): {}",
            status.failure,
            status.message.unwrap_or_default()
        ),
    }
}

/// Log snapshot changes until a shutdown signal arrives
async fn watch_snapshots(engine: &TipEngine) {
    let mut rates = engine.subscribe_rate();
    let mut balances = engine.subscribe_balance();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = rates.changed() => {
                if changed.is_err() {
                    break;
                }
                let rate = rates.borrow_and_update().clone();
                match rate.value {
                    Some(value) => info!(stale = rate.stale, "📈 SOL/USD {:.2}", value),
                    None if !rate.loading => warn!("Exchange rate unavailable"),
                    None => {}
                }
            }
            changed = balances.changed() => {
                if changed.is_err() {
                    break;
                }
                let balance = balances.borrow_and_update().clone();
                match balance.amount {
                    Some(amount) => info!("💰 Balance: {:.4} SOL", amount),
                    None if !balance.loading && balance.address.is_some() => {
                        warn!("Balance unavailable")
                    }
                    None => {}
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    info!("🪙  Solana Tip Engine v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    info!("📦 Initializing infrastructure...");

    let rpc_config = RpcClientConfig::from_env();
    let ledger = RpcLedgerClient::new(&config.rpc_url, rpc_config.clone())?;
    if let Err(e) = ledger.health_check().await {
        warn!(error = %e, "   ⚠ RPC health check failed; continuing");
    } else {
        info!("   ✓ RPC reachable at {}", config.rpc_url);
    }

    let wallet_provider = Arc::new(HttpSolanaRpcProvider::new(
        &config.rpc_url,
        rpc_config.timeout,
    )?);
    let wallet = KeypairWallet::new(&config.signing_key, wallet_provider)?;
    info!("   ✓ Wallet {}", wallet.address());

    let quotes = CoinGeckoPriceSource::new(config.price_api_url.clone(), None)?;
    info!("   ✓ Price source created (asset: {})", quotes.asset_id());

    let engine = TipEngine::new(
        Arc::new(wallet),
        Arc::new(ledger),
        Arc::new(quotes),
        EngineConfig::from_env(),
    );
    engine.start();

    let result = match config.one_shot_tip() {
        Some((recipient, amount)) => send_one_tip(&engine, recipient, amount).await,
        None => {
            info!("👀 Watching rate and balance (Ctrl+C to exit)");
            watch_snapshots(&engine).await;
            Ok(())
        }
    };

    engine.stop();
    info!("Shutdown complete");
    result
}
