//! Logging setup and log-safe rendering of secrets
//!
//! Library code only emits `tracing` events. Binaries and tests that want to
//! see them call [`init_tracing`]; `RUST_LOG` overrides the default filter.

use tracing_subscriber::fmt::{self, format::FmtSpan};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Output format for [`init_tracing_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single line per event
    #[default]
    Compact,
    /// One JSON object per event
    Json,
}

/// Install a stderr subscriber. Returns `false` if one was already set.
pub fn init_tracing(default_filter: &str) -> bool {
    init_tracing_with(default_filter, LogFormat::Compact)
}

/// Install a stderr subscriber with the given output format.
pub fn init_tracing_with(default_filter: &str, format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_span_events(FmtSpan::CLOSE)
                    .event_format(fmt::format().compact().with_target(false)),
            )
            .try_init(),
        LogFormat::Json => {
            registry.with(fmt::layer().json().with_writer(std::io::stderr)).try_init()
        }
    };
    result.is_ok()
}

/// Loggable stand-in for a token: first six characters and the length.
pub fn fingerprint(secret: &str) -> String {
    let prefix: String = secret.chars().take(6).collect();
    format!("{prefix}…({})", secret.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_hides_the_tail() {
        let token = "eyJhbGciOiJIUzI1NiJ9.payload.signature";
        let printed = fingerprint(token);
        assert!(printed.starts_with("eyJhbG"));
        assert!(!printed.contains("signature"));
        assert!(printed.ends_with(&format!("({})", token.len())));
    }

    #[test]
    fn second_init_is_harmless() {
        init_tracing("debug");
        assert!(!init_tracing("debug"));
    }
}
