//! Core types for infraprobe

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result, TransportError};

/// Attempts used when nothing else is configured (5 minutes at the default delay)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;

/// Pause between attempts when nothing else is configured
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// Ceiling on a single request
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// TLS trust settings applied to the HTTP transport
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsSettings {
    /// Skip certificate verification (self-signed or staging endpoints)
    pub accept_invalid_certs: bool,

    /// Extra PEM root certificate to trust
    pub ca_cert_path: Option<PathBuf>,

    /// Lowest TLS version to negotiate
    pub min_version: Option<TlsVersion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TlsVersion {
    #[serde(rename = "1.2")]
    Tls12,
    #[serde(rename = "1.3")]
    Tls13,
}

/// A bounded-retry probe of a single endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    /// Target URL
    pub address: String,

    /// Transport trust settings, applied to every attempt
    pub tls: TlsSettings,

    /// Upper bound on requests issued, at least 1
    pub max_attempts: u32,

    /// Wait between a failed attempt and the next one
    pub delay: Duration,

    /// Bound on a single request
    pub attempt_timeout: Duration,

    /// Bound on the whole probe, attempts and waits included
    pub deadline: Option<Duration>,
}

impl ProbeRequest {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            tls: TlsSettings::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_DELAY,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            deadline: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_tls(mut self, tls: TlsSettings) -> Self {
        self.tls = tls;
        self
    }

    /// Reject malformed input before any network activity
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(Error::InvalidInput("target address must not be empty".into()));
        }
        if self.max_attempts == 0 {
            return Err(Error::InvalidInput("max_attempts must be at least 1".into()));
        }
        if self.attempt_timeout.is_zero() {
            return Err(Error::InvalidInput("attempt_timeout must be positive".into()));
        }
        Ok(())
    }
}

/// Status and body of one HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Terminal state of a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// The validator accepted a response
    Matched,
    /// Every attempt was used without a match
    Exhausted,
    /// Cancelled or past its deadline before a match
    Cancelled,
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProbeOutcome::Matched => "matched",
            ProbeOutcome::Exhausted => "exhausted",
            ProbeOutcome::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// What a probe observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub address: String,
    pub outcome: ProbeOutcome,

    /// Requests issued
    pub attempts: u32,
    pub max_attempts: u32,

    /// Last response seen on any attempt
    pub last_status: Option<u16>,
    pub last_body: Option<String>,

    /// Set when the final attempt failed before a response arrived
    pub last_error: Option<TransportError>,

    pub elapsed_ms: u64,
}

impl ProbeReport {
    pub fn is_success(&self) -> bool {
        self.outcome == ProbeOutcome::Matched
    }

    /// Turn a failed probe into an error, keeping the diagnostics
    pub fn into_result(self) -> Result<ProbeReport> {
        match self.outcome {
            ProbeOutcome::Matched => Ok(self),
            ProbeOutcome::Exhausted => Err(Error::ValidationExhausted {
                address: self.address,
                attempts: self.attempts,
                last_status: self.last_status,
                last_body: self.last_body,
                last_error: self.last_error,
            }),
            ProbeOutcome::Cancelled => Err(Error::Cancelled {
                address: self.address,
                attempts: self.attempts,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_defaults() {
        let request = ProbeRequest::new("https://example.com/");
        assert_eq!(request.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(request.delay, DEFAULT_DELAY);
        assert!(request.deadline.is_none());
        assert!(request.validate().is_ok());
    }

    #[test_case("", 3 ; "empty address")]
    #[test_case("   ", 3 ; "blank address")]
    #[test_case("https://example.com/", 0 ; "zero attempts")]
    fn test_invalid_input(address: &str, attempts: u32) {
        let request = ProbeRequest::new(address).with_max_attempts(attempts);
        assert!(matches!(request.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_zero_delay_is_valid() {
        let request = ProbeRequest::new("http://localhost/").with_delay(Duration::ZERO);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_zero_attempt_timeout_is_invalid() {
        let request =
            ProbeRequest::new("http://localhost/").with_attempt_timeout(Duration::ZERO);
        assert!(request.validate().is_err());
    }

    fn report(outcome: ProbeOutcome) -> ProbeReport {
        ProbeReport {
            address: "https://example.com/".into(),
            outcome,
            attempts: 2,
            max_attempts: 2,
            last_status: Some(503),
            last_body: Some("unavailable".into()),
            last_error: None,
            elapsed_ms: 5000,
        }
    }

    #[test]
    fn test_into_result() {
        assert!(report(ProbeOutcome::Matched).into_result().is_ok());

        match report(ProbeOutcome::Exhausted).into_result() {
            Err(Error::ValidationExhausted { attempts, last_status, .. }) => {
                assert_eq!(attempts, 2);
                assert_eq!(last_status, Some(503));
            }
            other => panic!("expected ValidationExhausted, got {:?}", other),
        }

        assert!(matches!(
            report(ProbeOutcome::Cancelled).into_result(),
            Err(Error::Cancelled { attempts: 2, .. })
        ));
    }

    #[test]
    fn test_tls_version_names() {
        let tls: TlsSettings = toml::from_str(r#"min_version = "1.3""#).unwrap();
        assert_eq!(tls.min_version, Some(TlsVersion::Tls13));
        assert!(!tls.accept_invalid_certs);
    }
}
