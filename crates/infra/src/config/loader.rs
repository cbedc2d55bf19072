//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Whatever the source, the result is validated before it is returned.
//!
//! ## Environment Variables
//! Required:
//! - `MOWERLINK_APP_KEY`, `MOWERLINK_APP_SECRET`: gateway signing key pair
//! - `MOWERLINK_API_BASE_URL`: base URL for signed device calls
//! - `MOWERLINK_AUTH_BASE_URL`: base URL for login and token calls
//!
//! Optional:
//! - `MOWERLINK_GENERATION`: `oauth2` (default) or `legacy`
//! - `MOWERLINK_CLIENT_ID`, `MOWERLINK_CLIENT_SECRET`: OAuth client (required
//!   by validation for `oauth2`)
//! - `MOWERLINK_OAUTH_TOKEN_PATH`, `MOWERLINK_REGION`, `MOWERLINK_COUNTRY_CODE`
//! - `MOWERLINK_TIMEOUT_SECS`, `MOWERLINK_USER_AGENT`
//! - `MOWERLINK_MAX_RETRIES`, `MOWERLINK_RETRY_BASE_MS`,
//!   `MOWERLINK_RETRY_MULTIPLIER`, `MOWERLINK_RETRY_MAX_MS`
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./mowerlink.toml`, `./mowerlink.json`, `./config.toml`, `./config.json`
//! 2. The same names in the parent and grandparent directories
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use mowerlink_domain::{ApiGeneration, ClientConfig, ClientError, Result};
use url::Url;

const FILE_NAMES: [&str; 4] = ["mowerlink.toml", "mowerlink.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `ClientError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from `MOWERLINK_*` environment variables
///
/// # Errors
/// Returns `ClientError::Config` if required variables are missing or have
/// invalid values.
pub fn load_from_env() -> Result<ClientConfig> {
    let mut config = ClientConfig {
        app_key: env_var("MOWERLINK_APP_KEY")?,
        app_secret: env_var("MOWERLINK_APP_SECRET")?.into(),
        api_base_url: env_var("MOWERLINK_API_BASE_URL")?,
        auth_base_url: env_var("MOWERLINK_AUTH_BASE_URL")?,
        ..ClientConfig::default()
    };

    if let Some(generation) = env_opt("MOWERLINK_GENERATION") {
        config.generation = ApiGeneration::from_str(&generation)?;
    }
    if let Some(client_id) = env_opt("MOWERLINK_CLIENT_ID") {
        config.client_id = client_id;
    }
    if let Some(client_secret) = env_opt("MOWERLINK_CLIENT_SECRET") {
        config.client_secret = client_secret.into();
    }
    if let Some(path) = env_opt("MOWERLINK_OAUTH_TOKEN_PATH") {
        config.oauth_token_path = path;
    }
    if let Some(region) = env_opt("MOWERLINK_REGION") {
        config.region = Some(region);
    }
    if let Some(country) = env_opt("MOWERLINK_COUNTRY_CODE") {
        config.country_code = country;
    }
    if let Some(agent) = env_opt("MOWERLINK_USER_AGENT") {
        config.user_agent = agent;
    }
    if let Some(timeout) = env_parsed("MOWERLINK_TIMEOUT_SECS")? {
        config.request_timeout_secs = timeout;
    }
    if let Some(retries) = env_parsed("MOWERLINK_MAX_RETRIES")? {
        config.retry.max_retries = retries;
    }
    if let Some(base) = env_parsed("MOWERLINK_RETRY_BASE_MS")? {
        config.retry.base_delay_ms = base;
    }
    if let Some(multiplier) = env_parsed("MOWERLINK_RETRY_MULTIPLIER")? {
        config.retry.multiplier = multiplier;
    }
    if let Some(max) = env_parsed("MOWERLINK_RETRY_MAX_MS")? {
        config.retry.max_delay_ms = max;
    }

    finish(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `ClientError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ClientError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ClientError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ClientError::Config(format!("Failed to read config file: {e}")))?;

    finish(parse_config(&contents, &config_path)?)
}

/// Parse configuration from string content, format chosen by extension.
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ClientError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ClientError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(ClientError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.extend(cwd.ancestors().take(3).map(Path::to_path_buf));
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Validate, then check that both base URLs are absolute http(s) URLs.
fn finish(config: ClientConfig) -> Result<ClientConfig> {
    config.validate()?;
    check_base_url("api_base_url", &config.api_base_url)?;
    check_base_url("auth_base_url", &config.auth_base_url)?;
    Ok(config)
}

fn check_base_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| ClientError::Config(format!("{field} is not a valid URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ClientError::Config(format!("{field} must use http or https, got {other}"))),
    }
}

fn env_var(key: &str) -> Result<String> {
    env_opt(key)
        .ok_or_else(|| ClientError::Config(format!("Missing required environment variable: {key}")))
}

/// Set and non-blank.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ClientError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}
