//! Ledger RPC client implementation for Solana.
//!
//! All calls go through a [`SolanaRpcProvider`] so the client can be tested
//! without a node.

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    AppError, Anchor, BlockchainError, Commitment, ConfirmationOutcome, ConfirmationRequest,
    LedgerClient,
};

/// Configuration for the RPC client
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Delay between signature status checks while confirming
    pub confirmation_poll_interval: Duration,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            confirmation_poll_interval: Duration::from_millis(500),
        }
    }
}

impl RpcClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            timeout: parse("RPC_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: parse("RPC_MAX_RETRIES")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.max_retries),
            retry_delay: parse("RPC_RETRY_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_delay),
            confirmation_poll_interval: parse("RPC_CONFIRM_POLL_INTERVAL_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.confirmation_poll_interval),
        }
    }
}

/// Abstract provider for Solana RPC interactions to enable testing
#[async_trait]
pub trait SolanaRpcProvider: Send + Sync {
    /// Send a JSON-RPC request
    async fn send_request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, AppError>;
}

/// HTTP-based Solana RPC provider
pub struct HttpSolanaRpcProvider {
    http_client: Client,
    rpc_url: String,
}

impl HttpSolanaRpcProvider {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Blockchain(BlockchainError::Connection(e.to_string())))?;

        Ok(Self {
            http_client,
            rpc_url: rpc_url.to_string(),
        })
    }
}

#[async_trait]
impl SolanaRpcProvider for HttpSolanaRpcProvider {
    async fn send_request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, AppError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: method.to_string(),
            params,
        };

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Blockchain(BlockchainError::Timeout(e.to_string()))
                } else {
                    AppError::Blockchain(BlockchainError::Connection(e.to_string()))
                }
            })?;

        let rpc_response: JsonRpcResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| AppError::Blockchain(BlockchainError::RpcError(e.to_string())))?;

        if let Some(error) = rpc_response.error {
            return Err(AppError::Blockchain(BlockchainError::RpcError(format!(
                "{}: {}",
                error.code, error.message
            ))));
        }

        rpc_response.result.ok_or_else(|| {
            AppError::Blockchain(BlockchainError::RpcError("Empty response".to_string()))
        })
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<T: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    params: T,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// `{ "context": ..., "value": T }` envelope
#[derive(Debug, Deserialize)]
struct RpcValue<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct BlockhashResponse {
    blockhash: String,
    #[serde(rename = "lastValidBlockHeight")]
    last_valid_block_height: u64,
}

#[derive(Debug, Deserialize)]
struct SignatureStatus {
    err: Option<serde_json::Value>,
    #[serde(rename = "confirmationStatus")]
    confirmation_status: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum SignatureState {
    Pending,
    Reached,
}

/// Solana RPC ledger client
pub struct RpcLedgerClient {
    provider: Box<dyn SolanaRpcProvider>,
    config: RpcClientConfig,
}

impl RpcLedgerClient {
    /// Create a new RPC ledger client with custom configuration
    pub fn new(rpc_url: &str, config: RpcClientConfig) -> Result<Self, AppError> {
        let provider = HttpSolanaRpcProvider::new(rpc_url, config.timeout)?;
        info!(rpc_url = %rpc_url, "Created ledger client");
        Ok(Self::with_provider(Box::new(provider), config))
    }

    /// Create a new RPC ledger client with default configuration
    pub fn with_defaults(rpc_url: &str) -> Result<Self, AppError> {
        Self::new(rpc_url, RpcClientConfig::default())
    }

    /// Create a new client with a specific provider (useful for testing)
    pub fn with_provider(provider: Box<dyn SolanaRpcProvider>, config: RpcClientConfig) -> Self {
        Self { provider, config }
    }

    /// Check RPC connectivity
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let _: u64 = self.rpc_call("getSlot", Vec::<()>::new()).await?;
        Ok(())
    }

    /// Make an RPC call with retries
    #[instrument(skip(self, params))]
    async fn rpc_call<P: Serialize + Send + Sync, R: DeserializeOwned + Send>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, AppError> {
        let params_value = serde_json::to_value(params).map_err(|e| {
            AppError::Blockchain(BlockchainError::RpcError(format!(
                "Serialization error: {}",
                e
            )))
        })?;

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_delay).await;
            }
            match self
                .provider
                .send_request(method, params_value.clone())
                .await
            {
                Ok(result_value) => {
                    return serde_json::from_value(result_value).map_err(|e| {
                        AppError::Blockchain(BlockchainError::RpcError(format!(
                            "Deserialization error: {}",
                            e
                        )))
                    });
                }
                Err(e) => {
                    warn!(attempt = attempt, error = ?e, method = %method, "RPC call failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            AppError::Blockchain(BlockchainError::RpcError("Unknown error".to_string()))
        }))
    }

    async fn signature_state(
        &self,
        signature: &str,
        commitment: Commitment,
    ) -> Result<SignatureState, AppError> {
        let params = serde_json::json!([[signature], {"searchTransactionHistory": true}]);
        let result: RpcValue<Vec<Option<SignatureStatus>>> =
            self.rpc_call("getSignatureStatuses", params).await?;

        match result.value.first() {
            Some(Some(status)) => {
                if let Some(err) = &status.err {
                    return Err(AppError::Blockchain(BlockchainError::TransactionFailed(
                        err.to_string(),
                    )));
                }
                let reached = status
                    .confirmation_status
                    .as_deref()
                    .is_some_and(|s| commitment.is_satisfied_by(s));
                Ok(if reached {
                    SignatureState::Reached
                } else {
                    SignatureState::Pending
                })
            }
            _ => Ok(SignatureState::Pending),
        }
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    #[instrument(skip(self), fields(address = %address))]
    async fn get_balance(
        &self,
        address: &Pubkey,
        commitment: Commitment,
    ) -> Result<u64, AppError> {
        let params = serde_json::json!([address.to_string(), {"commitment": commitment.as_str()}]);
        let result: RpcValue<u64> = self.rpc_call("getBalance", params).await?;
        debug!(lamports = %result.value, "Fetched balance");
        Ok(result.value)
    }

    #[instrument(skip(self))]
    async fn get_latest_anchor(&self, commitment: Commitment) -> Result<Anchor, AppError> {
        let params = serde_json::json!([{"commitment": commitment.as_str()}]);
        let result: RpcValue<BlockhashResponse> =
            self.rpc_call("getLatestBlockhash", params).await?;
        Ok(Anchor {
            blockhash: result.value.blockhash,
            last_valid_block_height: result.value.last_valid_block_height,
        })
    }

    #[instrument(skip(self))]
    async fn get_block_height(&self, commitment: Commitment) -> Result<u64, AppError> {
        let params = serde_json::json!([{"commitment": commitment.as_str()}]);
        self.rpc_call("getBlockHeight", params).await
    }

    #[instrument(skip(self, request), fields(signature = %request.signature))]
    async fn confirm(
        &self,
        request: &ConfirmationRequest,
        commitment: Commitment,
    ) -> Result<ConfirmationOutcome, AppError> {
        loop {
            if self.signature_state(&request.signature, commitment).await?
                == SignatureState::Reached
            {
                info!("Transaction confirmed");
                return Ok(ConfirmationOutcome::Confirmed);
            }

            let height = self.get_block_height(commitment).await?;
            if height > request.anchor.last_valid_block_height {
                // Inclusion may have raced the height check.
                if self.signature_state(&request.signature, commitment).await?
                    == SignatureState::Reached
                {
                    info!("Transaction confirmed");
                    return Ok(ConfirmationOutcome::Confirmed);
                }
                warn!(
                    block_height = %height,
                    last_valid_block_height = %request.anchor.last_valid_block_height,
                    "Transaction anchor expired before confirmation"
                );
                return Ok(ConfirmationOutcome::Expired);
            }

            debug!(block_height = %height, "Transaction not yet confirmed");
            tokio::time::sleep(self.config.confirmation_poll_interval).await;
        }
    }
}

/// Parse a base58-encoded private key into a SigningKey
pub fn signing_key_from_base58(secret: &SecretString) -> Result<SigningKey, AppError> {
    let key_bytes = bs58::decode(secret.expose_secret())
        .into_vec()
        .map_err(|e| AppError::Blockchain(BlockchainError::InvalidKey(e.to_string())))?;

    // Handle both 32-byte (seed) and 64-byte (keypair) formats
    let key_array: [u8; 32] = if key_bytes.len() == 64 {
        // Solana keypair format: first 32 bytes are the secret key
        key_bytes[..32].try_into().map_err(|_| {
            AppError::Blockchain(BlockchainError::InvalidKey(
                "Invalid keypair format".to_string(),
            ))
        })?
    } else if key_bytes.len() == 32 {
        key_bytes.try_into().map_err(|v: Vec<u8>| {
            AppError::Blockchain(BlockchainError::InvalidKey(format!(
                "Key must be 32 bytes, got {}",
                v.len()
            )))
        })?
    } else {
        return Err(AppError::Blockchain(BlockchainError::InvalidKey(format!(
            "Key must be 32 or 64 bytes, got {}",
            key_bytes.len()
        ))));
    };

    Ok(SigningKey::from_bytes(&key_array))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockRpcProvider;
    use rand::rngs::OsRng;
    use serde_json::json;

    fn fast_config() -> RpcClientConfig {
        RpcClientConfig {
            max_retries: 3,
            retry_delay: Duration::from_millis(1),
            confirmation_poll_interval: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn client(provider: &MockRpcProvider) -> RpcLedgerClient {
        RpcLedgerClient::with_provider(Box::new(provider.clone()), fast_config())
    }

    fn status(confirmation: Option<&str>) -> serde_json::Value {
        json!({
            "context": {"slot": 1},
            "value": [confirmation.map(|c| json!({
                "slot": 1,
                "confirmations": null,
                "err": null,
                "confirmationStatus": c
            }))]
        })
    }

    fn request(last_valid_block_height: u64) -> ConfirmationRequest {
        ConfirmationRequest {
            signature: "5VERv8NMvzbJMEkV8xnrLkEaWRtSz9CosKDYjCJjBRnbJLgp8uirBgmQpjKhoR4tjF3ZpRzrFmBV6UjKdiSZkQUW".to_string(),
            anchor: Anchor {
                blockhash: "hash".to_string(),
                last_valid_block_height,
            },
        }
    }

    #[test]
    fn test_rpc_client_config_default() {
        let config = RpcClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_rpc_client_config_overrides() {
        let config = RpcClientConfig::from_lookup(|key| match key {
            "RPC_TIMEOUT_SECS" => Some("10".to_string()),
            "RPC_MAX_RETRIES" => Some("0".to_string()),
            "RPC_CONFIRM_POLL_INTERVAL_MS" => Some("0".to_string()),
            "RPC_RETRY_DELAY_MS" => Some("fast".to_string()),
            _ => None,
        });
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.retry_delay, Duration::from_millis(500));
        assert_eq!(config.confirmation_poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_client_creation() {
        let client = RpcLedgerClient::with_defaults("https://api.devnet.solana.com");
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_rpc_client_retry_logic_success() {
        let provider = MockRpcProvider::new();
        provider.push_error(
            "getBalance",
            AppError::Blockchain(BlockchainError::Timeout("Mock timeout".to_string())),
        );
        provider.push_error(
            "getBalance",
            AppError::Blockchain(BlockchainError::Timeout("Mock timeout".to_string())),
        );
        provider.push_ok("getBalance", json!({"context": {"slot": 1}, "value": 42}));

        let balance = client(&provider)
            .get_balance(&Pubkey::new_from_array([3; 32]), Commitment::Confirmed)
            .await;
        assert_eq!(balance.unwrap(), 42);
        assert_eq!(provider.call_count("getBalance"), 3);
    }

    #[tokio::test]
    async fn test_rpc_client_retry_logic_failure() {
        let provider = MockRpcProvider::new();
        for _ in 0..4 {
            provider.push_error(
                "getSlot",
                AppError::Blockchain(BlockchainError::Timeout("Mock timeout".to_string())),
            );
        }

        let result = client(&provider).health_check().await;
        assert!(matches!(
            result,
            Err(AppError::Blockchain(BlockchainError::Timeout(_)))
        ));
        assert_eq!(provider.call_count("getSlot"), 4);
    }

    #[tokio::test]
    async fn test_get_balance_sends_address_and_commitment() {
        let provider = MockRpcProvider::new();
        provider.push_ok("getBalance", json!({"context": {"slot": 1}, "value": 1_500_000_000u64}));
        let address = Pubkey::new_from_array([9; 32]);

        let balance = client(&provider)
            .get_balance(&address, Commitment::Confirmed)
            .await
            .unwrap();

        assert_eq!(balance, 1_500_000_000);
        let params = provider.last_params("getBalance").unwrap();
        assert_eq!(params[0], json!(address.to_string()));
        assert_eq!(params[1]["commitment"], json!("confirmed"));
    }

    #[tokio::test]
    async fn test_get_latest_anchor() {
        let provider = MockRpcProvider::new();
        provider.push_ok(
            "getLatestBlockhash",
            json!({
                "context": {"slot": 2792},
                "value": {
                    "blockhash": "EkSnNWid2cvwEVnVx9aBqawnmiCNiDgp3gUdkDPTKN1N",
                    "lastValidBlockHeight": 3090
                }
            }),
        );

        let anchor = client(&provider)
            .get_latest_anchor(Commitment::Confirmed)
            .await
            .unwrap();
        assert_eq!(anchor.blockhash, "EkSnNWid2cvwEVnVx9aBqawnmiCNiDgp3gUdkDPTKN1N");
        assert_eq!(anchor.last_valid_block_height, 3090);
    }

    #[tokio::test]
    async fn test_confirm_waits_until_confirmed() {
        let provider = MockRpcProvider::new();
        provider.push_ok("getSignatureStatuses", status(None));
        provider.push_ok("getSignatureStatuses", status(Some("processed")));
        provider.push_ok("getSignatureStatuses", status(Some("confirmed")));
        provider.push_ok("getBlockHeight", json!(100));

        let outcome = client(&provider)
            .confirm(&request(150), Commitment::Confirmed)
            .await
            .unwrap();
        assert_eq!(outcome, ConfirmationOutcome::Confirmed);
        assert_eq!(provider.call_count("getSignatureStatuses"), 3);
        assert_eq!(provider.call_count("getBlockHeight"), 2);
    }

    #[tokio::test]
    async fn test_confirm_reports_expiry_when_height_passes() {
        let provider = MockRpcProvider::new();
        provider.push_ok("getSignatureStatuses", status(None));
        provider.push_ok("getBlockHeight", json!(149));
        provider.push_ok("getBlockHeight", json!(150));
        provider.push_ok("getBlockHeight", json!(151));

        let outcome = client(&provider)
            .confirm(&request(150), Commitment::Confirmed)
            .await
            .unwrap();
        assert_eq!(outcome, ConfirmationOutcome::Expired);
        assert_eq!(provider.call_count("getBlockHeight"), 3);
        // three loop checks plus the final check after expiry
        assert_eq!(provider.call_count("getSignatureStatuses"), 4);
    }

    #[tokio::test]
    async fn test_confirm_late_inclusion_wins_over_expiry() {
        let provider = MockRpcProvider::new();
        provider.push_ok("getSignatureStatuses", status(None));
        provider.push_ok("getSignatureStatuses", status(Some("finalized")));
        provider.push_ok("getBlockHeight", json!(200));

        let outcome = client(&provider)
            .confirm(&request(150), Commitment::Confirmed)
            .await
            .unwrap();
        assert_eq!(outcome, ConfirmationOutcome::Confirmed);
    }

    #[tokio::test]
    async fn test_confirm_surfaces_transaction_error() {
        let provider = MockRpcProvider::new();
        provider.push_ok(
            "getSignatureStatuses",
            json!({
                "context": {"slot": 1},
                "value": [{
                    "slot": 1,
                    "confirmations": 0,
                    "err": {"InstructionError": [0, {"Custom": 1}]},
                    "confirmationStatus": "confirmed"
                }]
            }),
        );

        let result = client(&provider)
            .confirm(&request(150), Commitment::Confirmed)
            .await;
        assert!(matches!(
            result,
            Err(AppError::Blockchain(BlockchainError::TransactionFailed(_)))
        ));
    }

    #[test]
    fn test_deserialize_signature_status_null_confirmation() {
        let status: SignatureStatus =
            serde_json::from_value(json!({"err": null, "confirmationStatus": null})).unwrap();
        assert!(status.err.is_none());
        assert!(status.confirmation_status.is_none());
    }

    #[test]
    fn test_deserialize_blockhash_result() {
        let result: RpcValue<BlockhashResponse> = serde_json::from_value(json!({
            "context": {"slot": 1},
            "value": {"blockhash": "abc", "lastValidBlockHeight": 7}
        }))
        .unwrap();
        assert_eq!(result.value.blockhash, "abc");
        assert_eq!(result.value.last_valid_block_height, 7);
    }

    #[test]
    fn test_signing_key_from_base58_valid_32_bytes() {
        let original_key = SigningKey::generate(&mut OsRng);
        let encoded = bs58::encode(original_key.to_bytes()).into_string();
        let secret = SecretString::from(encoded);
        let result = signing_key_from_base58(&secret);
        assert_eq!(result.unwrap().to_bytes(), original_key.to_bytes());
    }

    #[test]
    fn test_signing_key_from_base58_valid_64_bytes() {
        let original_key = SigningKey::generate(&mut OsRng);
        let mut keypair = original_key.to_bytes().to_vec();
        keypair.extend_from_slice(original_key.verifying_key().as_bytes());
        let encoded = bs58::encode(&keypair).into_string();
        let secret = SecretString::from(encoded);
        let result = signing_key_from_base58(&secret);
        assert_eq!(result.unwrap().to_bytes(), original_key.to_bytes());
    }

    #[test]
    fn test_signing_key_from_base58_invalid() {
        let secret = SecretString::from("invalid-base58!!!");
        assert!(matches!(
            signing_key_from_base58(&secret),
            Err(AppError::Blockchain(BlockchainError::InvalidKey(_)))
        ));
    }

    #[test]
    fn test_signing_key_from_base58_wrong_length() {
        let secret = SecretString::from(bs58::encode([1u8; 16]).into_string());
        assert!(signing_key_from_base58(&secret).is_err());
    }
}
