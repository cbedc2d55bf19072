use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mowerlink_domain::{ClientError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client as ReqwestClient, Method, Response};
use serde_json::Value;
use tracing::debug;

use super::errors::map_reqwest_error;

/// Body of an outbound request.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    /// No body
    #[default]
    Empty,
    /// `application/x-www-form-urlencoded`
    Form(BTreeMap<String, String>),
    /// `application/json`
    Json(Value),
}

/// One outbound HTTP call.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Extra request headers
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: RequestBody,
}

impl TransportRequest {
    /// Bodyless POST to `url`.
    pub fn post(url: impl Into<String>) -> Self {
        Self { method: Method::POST, url: url.into(), headers: Vec::new(), body: RequestBody::Empty }
    }

    /// GET to `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: Method::GET, url: url.into(), headers: Vec::new(), body: RequestBody::Empty }
    }

    /// Append one header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Append several headers.
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Send `params` as a urlencoded form.
    pub fn form(mut self, params: BTreeMap<String, String>) -> Self {
        self.body = RequestBody::Form(params);
        self
    }

    /// Send `body` as JSON.
    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }
}

/// Successful (2xx) outcome of a call.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportResponse {
    /// Parsed JSON body
    Json(Value),
    /// Empty or non-JSON body
    Text(String),
}

impl TransportResponse {
    /// JSON body, or `None` for text.
    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }
}

/// A single request primitive. Classifies, never retries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse>;
}

/// HTTP transport over reqwest.
#[derive(Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
}

impl HttpTransport {
    /// Start building a new transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    async fn classify(response: Response) -> Result<TransportResponse> {
        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let text = response.text().await.map_err(map_reqwest_error)?;
        let parsed = serde_json::from_str::<Value>(&text).ok();

        if status.is_success() {
            return Ok(match parsed {
                Some(value) => TransportResponse::Json(value),
                None => TransportResponse::Text(text),
            });
        }

        let code = parsed.as_ref().and_then(super::envelope::vendor_code);
        let message = parsed
            .as_ref()
            .and_then(super::envelope::vendor_message)
            .unwrap_or_else(|| if text.is_empty() { status.to_string() } else { text.clone() });

        if status.as_u16() == 429 {
            return Err(ClientError::RateLimited { message, retry_after });
        }

        // Vendor codes that carry their own meaning win over the HTTP status
        if let Some(code) = code {
            match ClientError::from_vendor_code(code, message.clone(), parsed.clone()) {
                ClientError::Api { .. } => {}
                ClientError::RateLimited { message, .. } => {
                    return Err(ClientError::RateLimited { message, retry_after })
                }
                specific => return Err(specific),
            }
        }

        Err(ClientError::Api {
            status: status.as_u16(),
            code,
            message,
            body: Some(parsed.unwrap_or(Value::String(text))),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        let mut builder = self.client.request(request.method.clone(), &request.url);

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::InvalidState(format!("invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ClientError::InvalidState(format!("invalid header value: {e}")))?;
            headers.insert(name, value);
        }
        builder = builder.headers(headers);

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(params) => builder.form(params),
            RequestBody::Json(body) => builder.json(body),
        };

        debug!(method = %request.method, url = %request.url, "sending HTTP request");

        let response = builder.send().await.map_err(|err| {
            debug!(method = %request.method, url = %request.url, error = %err, "HTTP request failed");
            map_reqwest_error(err)
        })?;

        debug!(
            method = %request.method,
            url = %request.url,
            status = %response.status(),
            "received HTTP response"
        );

        Self::classify(response).await
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), user_agent: None, default_headers: None }
    }
}

impl HttpTransportBuilder {
    /// Per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `User-Agent` sent with every request.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Headers sent with every request.
    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Build the reqwest client.
    pub fn build(self) -> Result<HttpTransport> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(HttpTransport { client })
    }
}

/// `Retry-After` as delta-seconds or an HTTP-date.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let parsed = retry_after_at(raw, Utc::now());
    if parsed.is_none() {
        debug!(value = raw, "ignoring unparseable Retry-After header");
    }
    parsed
}

/// Dates in the past yield a zero delay.
fn retry_after_at(raw: &str, now: DateTime<Utc>) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}
