//! # Mowerlink Infrastructure
//!
//! Everything that talks to the vendor cloud.
//!
//! This crate contains:
//! - HTTP transport and vendor envelope handling
//! - Request signing (gateway HMAC and vendor OAuth)
//! - The two login strategies and the session manager
//! - The retry orchestrator and device operations
//! - The [`MowerClient`] facade, config loading and tracing setup
//!
//! ## Architecture
//! - Data model and error taxonomy come from `mowerlink-domain`
//! - Clock, sleeper, backoff and secrets come from `mowerlink-common`
//! - Contains all "impure" code (network, timers, environment)

pub mod auth;
pub mod client;
pub mod config;
pub mod devices;
pub mod http;
pub mod observability;
pub mod retry;
pub mod signing;

// Re-export commonly used items
pub use auth::{AuthStrategy, Credentials, LegacyStrategy, OAuth2Strategy, SessionManager, SessionRefresher};
pub use client::{MowerClient, MowerClientBuilder};
pub use devices::DeviceService;
pub use http::{HttpTransport, Transport, TransportRequest, TransportResponse};
pub use observability::{init_tracing, LogFormat};
pub use retry::{retry_config, ClientRetryPolicy, RetryOrchestrator};
