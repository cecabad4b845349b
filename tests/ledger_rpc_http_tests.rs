//! HTTP-based integration tests for the JSON-RPC ledger client.
//!
//! Uses `wiremock` to answer Solana JSON-RPC methods, matched on the
//! request body's `method` field.

use std::time::Duration;

use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use solana_tip_engine::domain::{
    Anchor, AppError, BlockchainError, Commitment, ConfirmationOutcome, ConfirmationRequest,
    LedgerClient,
};
use solana_tip_engine::infra::{RpcClientConfig, RpcLedgerClient};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, method},
};

fn fast_config() -> RpcClientConfig {
    RpcClientConfig {
        timeout: Duration::from_secs(5),
        max_retries: 1,
        retry_delay: Duration::from_millis(1),
        confirmation_poll_interval: Duration::from_millis(1),
    }
}

fn client(server: &MockServer) -> RpcLedgerClient {
    RpcLedgerClient::new(&server.uri(), fast_config()).unwrap()
}

fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result
    }))
}

async fn mount_method(server: &MockServer, rpc_method: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(response)
        .mount(server)
        .await;
}

fn request(last_valid_block_height: u64) -> ConfirmationRequest {
    ConfirmationRequest {
        signature: "5sig".to_string(),
        anchor: Anchor {
            blockhash: "EkSnNWid2cvwEVnVx9aBqawnmiCNiDgp3gUdkDPTKN1N".to_string(),
            last_valid_block_height,
        },
    }
}

#[tokio::test]
async fn test_get_balance() {
    let mock_server = MockServer::start().await;
    let address = Pubkey::new_from_array([3; 32]);

    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "getBalance",
            "params": [address.to_string(), { "commitment": "confirmed" }]
        })))
        .respond_with(rpc_result(json!({
            "context": { "slot": 1 },
            "value": 1_500_000_000u64
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let lamports = client(&mock_server)
        .get_balance(&address, Commitment::Confirmed)
        .await
        .unwrap();
    assert_eq!(lamports, 1_500_000_000);
}

#[tokio::test]
async fn test_get_latest_anchor() {
    let mock_server = MockServer::start().await;

    mount_method(
        &mock_server,
        "getLatestBlockhash",
        rpc_result(json!({
            "context": { "slot": 2 },
            "value": {
                "blockhash": "EkSnNWid2cvwEVnVx9aBqawnmiCNiDgp3gUdkDPTKN1N",
                "lastValidBlockHeight": 3090
            }
        })),
    )
    .await;

    let anchor = client(&mock_server)
        .get_latest_anchor(Commitment::Confirmed)
        .await
        .unwrap();
    assert_eq!(anchor.blockhash, "EkSnNWid2cvwEVnVx9aBqawnmiCNiDgp3gUdkDPTKN1N");
    assert_eq!(anchor.last_valid_block_height, 3090);
}

#[tokio::test]
async fn test_rpc_error_object_surfaces() {
    let mock_server = MockServer::start().await;

    mount_method(
        &mock_server,
        "getBalance",
        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32602, "message": "Invalid param: WrongSize" }
        })),
    )
    .await;

    let result = client(&mock_server)
        .get_balance(&Pubkey::new_from_array([3; 32]), Commitment::Confirmed)
        .await;
    match result {
        Err(AppError::Blockchain(BlockchainError::RpcError(msg))) => {
            assert!(msg.contains("-32602"));
            assert!(msg.contains("WrongSize"));
        }
        other => panic!("Expected RpcError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_call_is_retried() {
    let mock_server = MockServer::start().await;

    // max_retries = 1 means two attempts in total
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("garbage"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let result = client(&mock_server).get_block_height(Commitment::Confirmed).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_confirm_confirmed() {
    let mock_server = MockServer::start().await;

    mount_method(
        &mock_server,
        "getSignatureStatuses",
        rpc_result(json!({
            "context": { "slot": 5 },
            "value": [{
                "slot": 5,
                "confirmations": 1,
                "err": null,
                "confirmationStatus": "confirmed"
            }]
        })),
    )
    .await;

    let outcome = client(&mock_server)
        .confirm(&request(100), Commitment::Confirmed)
        .await
        .unwrap();
    assert_eq!(outcome, ConfirmationOutcome::Confirmed);
}

#[tokio::test]
async fn test_confirm_expired() {
    let mock_server = MockServer::start().await;

    mount_method(
        &mock_server,
        "getSignatureStatuses",
        rpc_result(json!({ "context": { "slot": 5 }, "value": [null] })),
    )
    .await;
    mount_method(&mock_server, "getBlockHeight", rpc_result(json!(101))).await;

    let outcome = client(&mock_server)
        .confirm(&request(100), Commitment::Confirmed)
        .await
        .unwrap();
    assert_eq!(outcome, ConfirmationOutcome::Expired);
}

#[tokio::test]
async fn test_confirm_transaction_error() {
    let mock_server = MockServer::start().await;

    mount_method(
        &mock_server,
        "getSignatureStatuses",
        rpc_result(json!({
            "context": { "slot": 5 },
            "value": [{
                "slot": 5,
                "confirmations": null,
                "err": { "InstructionError": [0, { "Custom": 1 }] },
                "confirmationStatus": "processed"
            }]
        })),
    )
    .await;

    let result = client(&mock_server)
        .confirm(&request(100), Commitment::Confirmed)
        .await;
    match result {
        Err(AppError::Blockchain(BlockchainError::TransactionFailed(msg))) => {
            assert!(msg.contains("InstructionError"));
        }
        other => panic!("Expected TransactionFailed, got {:?}", other),
    }
}
