//! Configuration loading
//!
//! `ClientConfig` itself lives in the domain crate; this module finds and
//! reads it from environment variables or files.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
