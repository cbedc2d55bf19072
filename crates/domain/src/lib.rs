//! # Mowerlink Domain
//!
//! Domain types and models for the mower cloud client.
//!
//! This crate contains:
//! - Session and exported auth-state types
//! - Device records, raw status bags and the normalized mower state
//! - The closed error taxonomy that drives retry decisions
//! - Vendor constants (result codes, endpoint paths, property keys)
//! - Client configuration and its validation
//!
//! ## Architecture
//! - Depends only on `mowerlink-common`, for the secret wrapper
//! - No I/O; everything here is pure data and pure functions

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::{ClientConfig, RetrySettings};
pub use errors::*;
pub use types::*;
