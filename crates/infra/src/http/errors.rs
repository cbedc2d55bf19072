//! reqwest failure classification

use mowerlink_domain::ClientError;

/// Classify a reqwest failure.
///
/// Anything that happened on the wire (DNS, TLS, connect, reset, timeout,
/// truncated body) is a network error. Builder failures are local bugs.
pub fn map_reqwest_error(err: reqwest::Error) -> ClientError {
    if err.is_builder() {
        return ClientError::InvalidState(format!("could not build request: {err}"));
    }

    let kind = if err.is_timeout() {
        "request timed out"
    } else if err.is_connect() {
        "connection failed"
    } else if err.is_body() || err.is_decode() {
        "response body unreadable"
    } else {
        "transport failure"
    };

    ClientError::Network(format!("{kind}: {err}"))
}
