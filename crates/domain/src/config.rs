//! Client configuration

use mowerlink_common::SecretString;
use serde::{Deserialize, Serialize};

use crate::errors::{ClientError, Result};
use crate::types::ApiGeneration;

/// Connection settings for one logical client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Login flow and session semantics
    pub generation: ApiGeneration,

    /// Gateway application key (Aliyun-style signing)
    pub app_key: String,
    /// Gateway signing secret
    #[serde(skip_serializing)]
    pub app_secret: SecretString,

    /// Vendor OAuth client id
    pub client_id: String,
    /// Vendor OAuth client secret
    #[serde(skip_serializing)]
    pub client_secret: SecretString,

    /// Base URL for signed device calls
    pub api_base_url: String,
    /// Base URL for login and token endpoints
    pub auth_base_url: String,
    /// Token endpoint path under `auth_base_url`
    pub oauth_token_path: String,

    /// Fixed region; looked up by country when unset
    pub region: Option<String>,
    /// ISO country code for the region lookup
    pub country_code: String,

    /// Per-request timeout
    pub request_timeout_secs: u64,
    /// `User-Agent` header value
    pub user_agent: String,

    /// Retry orchestrator tuning
    pub retry: RetrySettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            generation: ApiGeneration::default(),
            app_key: String::new(),
            app_secret: SecretString::default(),
            client_id: String::new(),
            client_secret: SecretString::default(),
            api_base_url: String::new(),
            auth_base_url: String::new(),
            oauth_token_path: crate::constants::PATH_OAUTH_TOKEN.to_string(),
            region: None,
            country_code: "DE".to_string(),
            request_timeout_secs: 30,
            user_agent: concat!("mowerlink/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: RetrySettings::default(),
        }
    }
}

impl ClientConfig {
    /// Reject configurations that cannot possibly authenticate.
    pub fn validate(&self) -> Result<()> {
        require("api_base_url", &self.api_base_url)?;
        require("auth_base_url", &self.auth_base_url)?;
        // Device calls are gateway-signed in both generations
        require("app_key", &self.app_key)?;
        require("app_secret", self.app_secret.expose())?;

        if self.generation == ApiGeneration::OAuth2 {
            require("client_id", &self.client_id)?;
            require("client_secret", self.client_secret.expose())?;
            if !self.oauth_token_path.starts_with('/') {
                return Err(ClientError::Config("oauth_token_path must start with '/'".into()));
            }
        }

        if self.request_timeout_secs == 0 {
            return Err(ClientError::Config("request_timeout_secs must be positive".into()));
        }

        self.retry.validate()
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(ClientError::Config(format!("{field} is required")))
    } else {
        Ok(())
    }
}

/// Retry orchestrator tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay_ms: u64,
    /// Growth factor per attempt
    pub multiplier: f64,
    /// Cap on any computed delay
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_retries: 3, base_delay_ms: 1_000, multiplier: 2.0, max_delay_ms: 60_000 }
    }
}

impl RetrySettings {
    /// Reject non-growing multipliers and inverted bounds.
    pub fn validate(&self) -> Result<()> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ClientError::Config(format!(
                "retry multiplier must be at least 1.0, got {}",
                self.multiplier
            )));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ClientError::Config(
                "retry max_delay_ms must not be below base_delay_ms".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth_config() -> ClientConfig {
        ClientConfig {
            app_key: "app".into(),
            app_secret: "app-secret".into(),
            client_id: "client".into(),
            client_secret: "client-secret".into(),
            api_base_url: "https://gw.example.com".into(),
            auth_base_url: "https://id.example.com".into(),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn complete_config_validates() {
        assert!(oauth_config().validate().is_ok());
    }

    #[test]
    fn oauth_requires_client_secret() {
        let config = ClientConfig { client_secret: " ".into(), ..oauth_config() };
        assert!(matches!(config.validate(), Err(ClientError::Config(msg)) if msg.contains("client_secret")));
    }

    #[test]
    fn legacy_does_not_need_oauth_client() {
        let config = ClientConfig {
            generation: ApiGeneration::Legacy,
            client_id: String::new(),
            client_secret: SecretString::default(),
            ..oauth_config()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bad_retry_settings_are_rejected() {
        let config = ClientConfig {
            retry: RetrySettings { multiplier: 0.5, ..RetrySettings::default() },
            ..oauth_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn secrets_are_not_serialized_or_printed() {
        let config = oauth_config();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("client-secret"));
        assert!(!json.contains("app-secret"));
        assert!(!format!("{config:?}").contains("client-secret"));
        assert!(!format!("{config:?}").contains("app-secret"));
    }

    #[test]
    fn secrets_deserialize_from_plain_strings() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"app_secret": "app-secret", "client_secret": "client-secret"}"#).unwrap();
        assert_eq!(config.app_secret.expose(), "app-secret");
        assert_eq!(config.client_secret.expose(), "client-secret");
    }
}
