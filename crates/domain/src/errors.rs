//! Error taxonomy for the mower cloud client
//!
//! A closed set of failures. The retry orchestrator matches on
//! [`ClientError::category`] exhaustively; every other layer only raises.

use std::time::Duration;

use thiserror::Error;

use crate::constants::{
    CODE_AUTH_REJECTED, CODE_DEVICE_OFFLINE, CODE_RATE_LIMITED, CODE_SESSION_INVALID,
    CODE_TOKEN_EXPIRED,
};

/// Categories of client errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Credentials or session rejected - terminal
    Authentication,
    /// Token expired - refresh the session, then retry
    TokenExpired,
    /// Throttled by the server - retry with server-informed delay
    RateLimited,
    /// Device is not connected - surfaced as device state, never retried
    DeviceOffline,
    /// Transport or generic API failure - retry with backoff
    Transient,
    /// Local misconfiguration, unusable response, cancellation - terminal
    Fatal,
}

/// Client operation errors
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Login or session rejected by the server
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Server-provided reason
        message: String,
        /// Vendor result code, when the envelope carried one
        code: Option<i64>,
    },

    /// Access token no longer accepted (vendor code 460)
    #[error("Session token expired: {message}")]
    TokenExpired {
        /// Server-provided reason
        message: String,
    },

    /// No usable session to sign with
    #[error("Session invalid: {message}")]
    SessionInvalid {
        /// What made the session unusable
        message: String,
    },

    /// Server throttled the request
    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        /// Server-provided reason
        message: String,
        /// Parsed `Retry-After` hint
        retry_after: Option<Duration>,
    },

    /// Device is not connected to the cloud (vendor code 6205)
    #[error("Device offline: {message}")]
    DeviceOffline {
        /// Server-provided reason
        message: String,
        /// Device the call was addressed to
        device_id: Option<String>,
    },

    /// Any other non-success response
    #[error("API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Vendor result code from the envelope
        code: Option<i64>,
        /// Server-provided reason
        message: String,
        /// Raw response body, when it was JSON
        body: Option<serde_json::Value>,
    },

    /// Connection, timeout or body transfer failure
    #[error("Network error: {0}")]
    Network(String),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Response could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Local state does not allow the operation
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// Client shut down or the call was cancelled
    #[error("Operation cancelled")]
    Cancelled,
}

impl ClientError {
    /// Map a vendor envelope result code to an error.
    ///
    /// Used for responses that arrive with HTTP 2xx but carry a non-success
    /// `code` in the body.
    pub fn from_vendor_code(
        code: i64,
        message: impl Into<String>,
        body: Option<serde_json::Value>,
    ) -> Self {
        let message = message.into();
        if code == CODE_TOKEN_EXPIRED {
            Self::TokenExpired { message }
        } else if CODE_SESSION_INVALID.contains(&code) {
            Self::SessionInvalid { message }
        } else if CODE_AUTH_REJECTED.contains(&code) {
            Self::Authentication { message, code: Some(code) }
        } else if code == CODE_DEVICE_OFFLINE {
            Self::DeviceOffline { message, device_id: None }
        } else if CODE_RATE_LIMITED.contains(&code) {
            Self::RateLimited { message, retry_after: None }
        } else {
            Self::Api { status: 200, code: Some(code), message, body }
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication { .. } | Self::SessionInvalid { .. } => {
                ErrorCategory::Authentication
            }
            Self::TokenExpired { .. } => ErrorCategory::TokenExpired,
            Self::RateLimited { .. } => ErrorCategory::RateLimited,
            Self::DeviceOffline { .. } => ErrorCategory::DeviceOffline,
            Self::Api { .. } if self.wraps_auth_code() => ErrorCategory::Authentication,
            Self::Api { .. } | Self::Network(_) => ErrorCategory::Transient,
            Self::Config(_) | Self::InvalidResponse(_) | Self::InvalidState(_) | Self::Cancelled => {
                ErrorCategory::Fatal
            }
        }
    }

    /// True for every authentication-family failure, including token expiry.
    ///
    /// Callers translate these into a "needs re-login" state.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.category(), ErrorCategory::Authentication | ErrorCategory::TokenExpired)
    }

    /// Check if this error may succeed when retried (possibly after refresh)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::TokenExpired | ErrorCategory::RateLimited | ErrorCategory::Transient
        )
    }

    /// Server-supplied wait hint, when the failure carried one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Attach the device identifier to a device-offline failure.
    #[must_use]
    pub fn with_device(self, id: &str) -> Self {
        match self {
            Self::DeviceOffline { message, .. } => {
                Self::DeviceOffline { message, device_id: Some(id.to_string()) }
            }
            other => other,
        }
    }

    fn wraps_auth_code(&self) -> bool {
        match self {
            Self::Api { status, code, .. } => {
                matches!(status, 401 | 403)
                    || code.is_some_and(|c| {
                        CODE_AUTH_REJECTED.contains(&c) || CODE_SESSION_INVALID.contains(&c)
                    })
            }
            _ => false,
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
