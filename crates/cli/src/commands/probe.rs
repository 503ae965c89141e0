//! Probe Commands
//!
//! One-shot bounded-retry probe of a single URL.

use anyhow::Result;
use clap::Args;
use infraprobe_common::{Expectation, InfraprobeConfig, Prober};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::output::{print_error, print_item, print_success, OutputFormat};

#[derive(Args)]
pub struct ProbeArgs {
    /// Target URL
    pub url: String,

    /// Maximum number of requests
    #[arg(short = 'n', long)]
    pub attempts: Option<u32>,

    /// Seconds to wait between attempts
    #[arg(short, long)]
    pub delay_secs: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Give up after this many seconds overall
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Required status code (default: any 2xx)
    #[arg(long)]
    pub expect_status: Option<u16>,

    /// Required response body, compared after trimming
    #[arg(long)]
    pub expect_body: Option<String>,

    /// Required response body substring
    #[arg(long)]
    pub expect_body_contains: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(short = 'k', long)]
    pub insecure: bool,

    /// Extra PEM root certificate to trust
    #[arg(long)]
    pub ca_cert: Option<PathBuf>,
}

/// Returns whether the probe matched
pub async fn execute(args: ProbeArgs, config: &InfraprobeConfig, format: OutputFormat) -> Result<bool> {
    let mut tls = config.tls.clone();
    if args.insecure {
        tls.accept_invalid_certs = true;
    }
    if let Some(ca) = args.ca_cert {
        tls.ca_cert_path = Some(ca);
    }

    let mut request = config.probe.request(args.url, &tls);
    if let Some(n) = args.attempts {
        request.max_attempts = n;
    }
    if let Some(secs) = args.delay_secs {
        request.delay = Duration::from_secs(secs);
    }
    if let Some(secs) = args.timeout_secs {
        request.attempt_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = args.deadline_secs {
        request.deadline = Some(Duration::from_secs(secs));
    }

    let validator = Expectation {
        status: args.expect_status,
        body: args.expect_body,
        body_contains: args.expect_body_contains,
    }
    .validator();
    debug!(validator = validator.description(), "Probing {}", request.address);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let report = Prober::http().probe_until_cancelled(&request, &validator, &cancel).await?;
    let matched = report.is_success();

    print_item(&report, format);
    if matched {
        print_success(&format!("{} matched after {} attempt(s)", report.address, report.attempts));
    } else {
        print_error(&format!("{} did not match: {}", report.address, validator.description()));
    }

    Ok(matched)
}
