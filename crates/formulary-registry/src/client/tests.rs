//! Unit tests for the registry client

use super::*;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

fn client_for(server: &MockServer) -> RegistryClient {
    RegistryClient::new(&server.uri(), Arc::new(IndexCache::new()))
        .unwrap()
        .with_retry_config(fast_retry())
}

fn index_json() -> serde_json::Value {
    serde_json::json!({
        "stats": {
            "description": "Statistics helpers",
            "versions": {
                "1.0.0": {
                    "dependencies": [],
                    "path": "archives/stats-1.0.0.gspkg"
                },
                "1.1.0": {
                    "dependencies": ["text>=1.0"]
                }
            }
        }
    })
}

#[tokio::test]
async fn test_client_creation() {
    let client = RegistryClient::new("https://example.com/registry/", Arc::new(IndexCache::new())).unwrap();
    assert_eq!(client.base_url(), "https://example.com/registry");
    assert_eq!(client.retry_config.max_retries, 3);
}

#[tokio::test]
async fn test_invalid_url_rejected() {
    let err = RegistryClient::new("not a url", Arc::new(IndexCache::new())).unwrap_err();
    assert!(matches!(err, FormularyError::ConfigValidation { .. }));
}

#[tokio::test]
async fn test_retry_config_default() {
    let config = RetryConfig::default();
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.initial_delay, Duration::from_millis(100));
    assert_eq!(config.max_delay, Duration::from_secs(10));
    assert_eq!(config.multiplier, 2.0);
}

#[tokio::test]
async fn test_index_is_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(index_json()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let first = client.index().await.unwrap();
    let second = client.index().await.unwrap();

    assert_eq!(first.len(), 1);
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_refresh_refetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(index_json()))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.index().await.unwrap();
    client.refresh().await.unwrap();
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.json"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.index().await.unwrap_err();
    assert!(matches!(err, FormularyError::Network { .. }));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn test_malformed_index() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(matches!(
        client.index().await.unwrap_err(),
        FormularyError::JsonParse { .. }
    ));
}

#[tokio::test]
async fn test_download_from_index_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(index_json()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/archives/stats-1.0.0.gspkg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"archive-bytes".to_vec()))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let data = client.fetch_archive("stats", "1.0.0").await.unwrap();

    assert_eq!(data, b"archive-bytes");
}

#[tokio::test]
async fn test_download_falls_back_to_legacy_layout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(index_json()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/archives/stats-1.0.0.gspkg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/packages/stats/1.0.0/stats@1.0.0.gspkg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"legacy".to_vec()))
        .mount(&server)
        .await;

    let data = client_for(&server)
        .fetch_archive("stats", "1.0.0")
        .await
        .unwrap();

    assert_eq!(data, b"legacy");
}

#[tokio::test]
async fn test_download_missing_everywhere() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(index_json()))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .fetch_archive("stats", "1.1.0")
        .await
        .unwrap_err();

    assert!(matches!(err, FormularyError::VersionNotFound { .. }));
}
