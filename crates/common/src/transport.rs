//! HTTP transport used by probes

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::types::{HttpResponse, TlsSettings, TlsVersion};

/// A single request/response exchange.
///
/// Implementations issue exactly one request per call, honour the TLS
/// settings of the request and respect the timeout they are given.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Check that requests with `tls` can be issued at all. Runs once per
    /// probe, before the first attempt.
    fn prepare(&self, _tls: &TlsSettings) -> Result<()> {
        Ok(())
    }

    async fn send(
        &self,
        address: &str,
        tls: &TlsSettings,
        timeout: Duration,
    ) -> std::result::Result<HttpResponse, TransportError>;
}

/// reqwest-backed transport (rustls), one client per distinct TLS settings
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    clients: Arc<Mutex<HashMap<TlsSettings, reqwest::Client>>>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client for `tls`, built on first use
    pub fn client(&self, tls: &TlsSettings) -> Result<reqwest::Client> {
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(tls) {
            return Ok(client.clone());
        }
        let client = build_client(tls)?;
        clients.insert(tls.clone(), client.clone());
        Ok(client)
    }
}

fn build_client(tls: &TlsSettings) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .user_agent(concat!("infraprobe/", env!("CARGO_PKG_VERSION")));

    if tls.accept_invalid_certs {
        builder = builder.danger_accept_invalid_certs(true);
    }

    if let Some(path) = &tls.ca_cert_path {
        let pem = std::fs::read(path)?;
        let cert = reqwest::Certificate::from_pem(&pem)?;
        builder = builder.add_root_certificate(cert);
    }

    if let Some(version) = tls.min_version {
        builder = builder.min_tls_version(match version {
            TlsVersion::Tls12 => reqwest::tls::Version::TLS_1_2,
            TlsVersion::Tls13 => reqwest::tls::Version::TLS_1_3,
        });
    }

    Ok(builder.build()?)
}

#[async_trait]
impl Transport for HttpTransport {
    fn prepare(&self, tls: &TlsSettings) -> Result<()> {
        self.client(tls).map(|_| ())
    }

    async fn send(
        &self,
        address: &str,
        tls: &TlsSettings,
        timeout: Duration,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let client = self
            .client(tls)
            .map_err(|e| TransportError::Tls(e.to_string()))?;

        let response = client
            .get(address)
            .timeout(timeout)
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        debug!(address, status, bytes = body.len(), "Received response");
        Ok(HttpResponse { status, body })
    }
}
