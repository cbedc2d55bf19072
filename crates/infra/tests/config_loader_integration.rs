//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files and
//! building a client from it.

use mowerlink_domain::ApiGeneration;
use mowerlink_infra::{config, MowerClient};
use tempfile::TempDir;

#[test]
fn test_load_config_from_toml_file_and_build_client() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("mowerlink.toml");
    std::fs::write(
        &path,
        r#"
generation = "legacy"
app_key = "app-key"
app_secret = "app-secret"
api_base_url = "https://eu-central-1.api-iot.example.com"
auth_base_url = "https://account.example.com"
country_code = "SE"
request_timeout_secs = 10

[retry]
max_retries = 4
multiplier = 3.0
"#,
    )
    .expect("Failed to write config");

    let config = config::load_from_file(Some(path)).expect("config should load");

    assert_eq!(config.generation, ApiGeneration::Legacy);
    assert_eq!(config.country_code, "SE");
    assert_eq!(config.request_timeout_secs, 10);
    assert_eq!(config.retry.max_retries, 4);
    assert_eq!(config.retry.base_delay_ms, 1_000);

    let client = MowerClient::new(config).expect("client should build");
    assert_eq!(client.generation(), ApiGeneration::Legacy);
}

#[test]
fn test_secrets_are_not_serialized_back() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{
            "app_key": "app-key",
            "app_secret": "app-secret",
            "client_id": "client",
            "client_secret": "client-secret",
            "api_base_url": "https://api.example.com",
            "auth_base_url": "https://auth.example.com"
        }"#,
    )
    .expect("Failed to write config");

    let config = config::load_from_file(Some(path)).expect("config should load");
    assert_eq!(config.generation, ApiGeneration::OAuth2);

    let echoed = serde_json::to_string(&config).unwrap();
    assert!(!echoed.contains("client-secret"));
    assert!(!echoed.contains("app-secret"));
    assert!(!format!("{config:?}").contains("client-secret"));
}

#[test]
fn test_missing_file_is_a_config_error() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let result = config::load_from_file(Some(dir.path().join("absent.toml")));
    assert!(matches!(result, Err(mowerlink_domain::ClientError::Config(_))));
}
