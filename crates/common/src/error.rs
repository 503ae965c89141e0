//! Error types for infraprobe

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using the infraprobe Error
pub type Result<T> = std::result::Result<T, Error>;

/// infraprobe error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid probe input: {0}")]
    InvalidInput(String),

    #[error("Validation exhausted after {attempts} attempt(s) against {address} (last status: {last_status:?}, last error: {last_error:?})")]
    ValidationExhausted {
        address: String,
        attempts: u32,
        last_status: Option<u16>,
        last_body: Option<String>,
        last_error: Option<TransportError>,
    },

    #[error("Probe of {address} cancelled after {attempts} attempt(s)")]
    Cancelled { address: String, attempts: u32 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failure of a single probe attempt at the transport level.
///
/// These never terminate a probe on their own; the prober records them and
/// retries like a validation mismatch.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("TLS failure: {0}")]
    Tls(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let detail = error_chain(&e);

        if e.is_timeout() {
            TransportError::Timeout(detail)
        } else if looks_like_tls(&detail) {
            TransportError::Tls(detail)
        } else if e.is_connect() {
            TransportError::Connect(detail)
        } else if e.is_body() || e.is_decode() {
            TransportError::Body(detail)
        } else {
            TransportError::Other(detail)
        }
    }
}

/// Flatten an error and its sources into one line.
///
/// reqwest hides the interesting part (refused, certificate, ...) a few
/// levels down the source chain.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = inner.source();
    }
    message
}

fn looks_like_tls(detail: &str) -> bool {
    let lower = detail.to_ascii_lowercase();
    ["certificate", "tls", "handshake", "unknownissuer"]
        .iter()
        .any(|needle| lower.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Leaf;

    impl std::fmt::Display for Leaf {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "invalid peer certificate: UnknownIssuer")
        }
    }

    impl std::error::Error for Leaf {}

    #[derive(Debug)]
    struct Outer(Leaf);

    impl std::fmt::Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "error sending request")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_error_chain_includes_sources() {
        let chain = error_chain(&Outer(Leaf));
        assert_eq!(
            chain,
            "error sending request: invalid peer certificate: UnknownIssuer"
        );
        assert!(looks_like_tls(&chain));
    }

    #[test]
    fn test_connection_refused_is_not_tls() {
        assert!(!looks_like_tls("tcp connect error: Connection refused (os error 111)"));
    }

    #[test]
    fn test_transport_error_serializes_with_kind() {
        let json = serde_json::to_value(TransportError::Connect("refused".into())).unwrap();
        assert_eq!(json["kind"], "connect");
        assert_eq!(json["message"], "refused");
    }
}
