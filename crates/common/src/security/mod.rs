//! Secret handling
//!
//! [`SecretString`] wraps passwords and application secrets so they are
//! zeroed on drop and redacted from `Debug`/`Display` output.

pub mod secret;

pub use secret::SecretString;
