//! Bounded retry prober
//!
//! Issues a request, hands the response to a [`Validator`], and retries on a
//! fixed interval until the validator matches, the attempts run out, or the
//! probe is cancelled.
//!
//! ```text
//! Idle -> Attempting -> Matched                 (success)
//!                    -> Retrying -> Attempting
//!                    -> Exhausted               (failure)
//!         Attempting | Retrying -> Cancelled    (failure)
//! ```
//!
//! Transport errors and non-matching responses are data: they are recorded
//! on the [`ProbeReport`] and never end the probe early. Only malformed
//! input and TLS settings the transport cannot use are returned as errors,
//! and both are returned before any I/O.

use std::time::Duration;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::transport::{HttpTransport, Transport};
use crate::types::{ProbeOutcome, ProbeReport, ProbeRequest};
use crate::validator::Validator;

/// Runs probes over a transport
#[derive(Debug, Clone)]
pub struct Prober<T = HttpTransport> {
    transport: T,
}

impl Prober<HttpTransport> {
    /// Prober over reqwest; TLS comes from each request
    pub fn http() -> Self {
        Self::new(HttpTransport::new())
    }
}

impl Default for Prober<HttpTransport> {
    fn default() -> Self {
        Self::http()
    }
}

impl<T: Transport> Prober<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Probe until match or exhaustion, bounded only by the request's deadline
    pub async fn probe(&self, request: &ProbeRequest, validator: &Validator) -> Result<ProbeReport> {
        self.probe_until_cancelled(request, validator, &CancellationToken::new())
            .await
    }

    /// Probe, aborting promptly once `cancel` fires or the deadline passes
    pub async fn probe_until_cancelled(
        &self,
        request: &ProbeRequest,
        validator: &Validator,
        cancel: &CancellationToken,
    ) -> Result<ProbeReport> {
        request.validate()?;
        self.transport.prepare(&request.tls)?;

        let started = Instant::now();
        let deadline = request.deadline.map(|d| started + d);
        let mut state = ProbeState::new(request, started);

        debug!(
            address = %request.address,
            max_attempts = request.max_attempts,
            delay_ms = request.delay.as_millis() as u64,
            validator = validator.description(),
            "Starting probe"
        );

        for attempt in 1..=request.max_attempts {
            if cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(state.finish(ProbeOutcome::Cancelled));
            }

            state.attempts = attempt;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(state.finish(ProbeOutcome::Cancelled)),
                _ = wait_for_deadline(deadline) => return Ok(state.finish(ProbeOutcome::Cancelled)),
                result = self.attempt(request) => result,
            };

            match result {
                Ok(response) => {
                    let matched = validator.check(response.status, &response.body);
                    state.last_status = Some(response.status);
                    state.last_body = Some(response.body);
                    state.last_error = None;

                    if matched {
                        info!(
                            address = %request.address,
                            attempt,
                            status = response.status,
                            "Probe matched"
                        );
                        return Ok(state.finish(ProbeOutcome::Matched));
                    }

                    debug!(
                        address = %request.address,
                        attempt,
                        max_attempts = request.max_attempts,
                        status = response.status,
                        "Response did not match"
                    );
                }
                Err(e) => {
                    debug!(
                        address = %request.address,
                        attempt,
                        max_attempts = request.max_attempts,
                        error = %e,
                        "Attempt failed"
                    );
                    state.last_error = Some(e);
                }
            }

            // No trailing wait after the final attempt
            if attempt == request.max_attempts || request.delay.is_zero() {
                continue;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(state.finish(ProbeOutcome::Cancelled)),
                _ = wait_for_deadline(deadline) => return Ok(state.finish(ProbeOutcome::Cancelled)),
                _ = sleep(request.delay) => {}
            }
        }

        let report = state.finish(ProbeOutcome::Exhausted);
        warn!(
            address = %report.address,
            attempts = report.attempts,
            last_status = ?report.last_status,
            last_error = ?report.last_error,
            "Probe exhausted"
        );
        Ok(report)
    }

    /// One request, bounded by the per-attempt timeout
    async fn attempt(
        &self,
        request: &ProbeRequest,
    ) -> std::result::Result<crate::types::HttpResponse, TransportError> {
        match timeout(
            request.attempt_timeout,
            self.transport
                .send(&request.address, &request.tls, request.attempt_timeout),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(format!(
                "no response within {:?}",
                request.attempt_timeout
            ))),
        }
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Diagnostics accumulated while probing
struct ProbeState {
    address: String,
    max_attempts: u32,
    started: Instant,
    attempts: u32,
    last_status: Option<u16>,
    last_body: Option<String>,
    last_error: Option<TransportError>,
}

impl ProbeState {
    fn new(request: &ProbeRequest, started: Instant) -> Self {
        Self {
            address: request.address.clone(),
            max_attempts: request.max_attempts,
            started,
            attempts: 0,
            last_status: None,
            last_body: None,
            last_error: None,
        }
    }

    fn finish(self, outcome: ProbeOutcome) -> ProbeReport {
        if outcome == ProbeOutcome::Cancelled {
            info!(address = %self.address, attempts = self.attempts, "Probe cancelled");
        }
        ProbeReport {
            address: self.address,
            outcome,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            last_status: self.last_status,
            last_body: self.last_body,
            last_error: self.last_error,
            elapsed_ms: elapsed_ms(self.started.elapsed()),
        }
    }
}

fn elapsed_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
