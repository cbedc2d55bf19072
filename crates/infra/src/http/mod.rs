//! HTTP transport
//!
//! A pure mapping from wire outcome to typed result or error. Retrying is
//! the orchestrator's job, not this layer's.

pub mod client;
pub mod envelope;
pub mod errors;

pub use client::{
    HttpTransport, HttpTransportBuilder, RequestBody, Transport, TransportRequest,
    TransportResponse,
};
pub use errors::map_reqwest_error;
