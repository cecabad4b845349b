//! HTTP-based integration tests for the CoinGecko price source.
//!
//! Uses `wiremock` to stand in for the `simple/price` endpoint.

use serde_json::json;
use solana_tip_engine::domain::{AppError, ExternalServiceError, PriceQuoteSource};
use solana_tip_engine::infra::CoinGeckoPriceSource;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

fn source(server: &MockServer) -> CoinGeckoPriceSource {
    CoinGeckoPriceSource::new(Some(server.uri()), None).unwrap()
}

#[tokio::test]
async fn test_fetch_rate_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .and(query_param("ids", "solana"))
        .and(query_param("vs_currencies", "usd"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "solana": { "usd": 142.37 }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let rate = source(&mock_server).fetch_rate().await.unwrap();
    assert!((rate - 142.37).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_fetch_rate_custom_asset() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .and(query_param("ids", "wrapped-solana"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "wrapped-solana": { "usd": 99.5 }
        })))
        .mount(&mock_server)
        .await;

    let source =
        CoinGeckoPriceSource::new(Some(mock_server.uri()), Some("wrapped-solana".to_string()))
            .unwrap();
    let rate = source.fetch_rate().await.unwrap();
    assert!((rate - 99.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_fetch_rate_api_error_500() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let result = source(&mock_server).fetch_rate().await;
    match result {
        Err(AppError::ExternalService(ExternalServiceError::ApiError {
            status_code,
            message,
        })) => {
            assert_eq!(status_code, 500);
            assert_eq!(message, "Internal Server Error");
        }
        other => panic!("Expected ApiError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_rate_rate_limited() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "status": { "error_code": 429, "error_message": "You've exceeded the Rate Limit" }
        })))
        .mount(&mock_server)
        .await;

    let result = source(&mock_server).fetch_rate().await;
    assert!(matches!(
        result,
        Err(AppError::ExternalService(ExternalServiceError::ApiError {
            status_code: 429,
            ..
        }))
    ));
}

#[tokio::test]
async fn test_fetch_rate_invalid_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not valid json"))
        .mount(&mock_server)
        .await;

    let result = source(&mock_server).fetch_rate().await;
    assert!(matches!(
        result,
        Err(AppError::ExternalService(ExternalServiceError::ParseError(_)))
    ));
}

#[tokio::test]
async fn test_fetch_rate_missing_asset() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let result = source(&mock_server).fetch_rate().await;
    match result {
        Err(AppError::ExternalService(ExternalServiceError::ParseError(msg))) => {
            assert!(msg.contains("solana"));
        }
        other => panic!("Expected ParseError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_rate_rejects_non_positive_quote() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "solana": { "usd": 0.0 }
        })))
        .mount(&mock_server)
        .await;

    let result = source(&mock_server).fetch_rate().await;
    assert!(matches!(
        result,
        Err(AppError::ExternalService(ExternalServiceError::ParseError(_)))
    ));
}

#[tokio::test]
async fn test_fetch_rate_network_error() {
    let source =
        CoinGeckoPriceSource::new(Some("http://127.0.0.1:1".to_string()), None).unwrap();

    let result = source.fetch_rate().await;
    assert!(matches!(
        result,
        Err(AppError::ExternalService(ExternalServiceError::Network(_)))
    ));
}
