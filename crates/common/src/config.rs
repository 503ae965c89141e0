//! infraprobe configuration
//!
//! Loaded from `~/.infraprobe/config.toml` (or `--config`). Every field has
//! a default, so a missing file or a partial file is fine.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{
    ProbeRequest, TlsSettings, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_DELAY, DEFAULT_MAX_ATTEMPTS,
};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfraprobeConfig {
    /// Probe defaults
    pub probe: ProbeDefaults,

    /// TLS settings for every probe
    pub tls: TlsSettings,

    /// Terraform driver settings
    pub terraform: TerraformSettings,
}

/// Defaults applied to probes that do not override them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeDefaults {
    pub max_attempts: u32,
    pub delay_secs: u64,
    pub attempt_timeout_secs: u64,

    /// Overall bound per probe; unbounded when unset
    pub deadline_secs: Option<u64>,
}

impl Default for ProbeDefaults {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_secs: DEFAULT_DELAY.as_secs(),
            attempt_timeout_secs: DEFAULT_ATTEMPT_TIMEOUT.as_secs(),
            deadline_secs: None,
        }
    }
}

impl ProbeDefaults {
    /// Build a request for `address` from these defaults
    pub fn request(&self, address: impl Into<String>, tls: &TlsSettings) -> ProbeRequest {
        let mut request = ProbeRequest::new(address)
            .with_max_attempts(self.max_attempts)
            .with_delay(Duration::from_secs(self.delay_secs))
            .with_attempt_timeout(Duration::from_secs(self.attempt_timeout_secs))
            .with_tls(tls.clone());
        if let Some(secs) = self.deadline_secs {
            request = request.with_deadline(Duration::from_secs(secs));
        }
        request
    }
}

/// How the Terraform CLI is driven
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraformSettings {
    /// Binary name or path
    pub binary: String,

    /// Pass `-no-color` so output is parseable
    pub no_color: bool,

    /// Retries for commands failing with a known transient error
    pub max_retries: u32,

    pub time_between_retries_secs: u64,

    /// Leave provisioned resources in place (debugging only)
    pub skip_teardown: bool,
}

impl Default for TerraformSettings {
    fn default() -> Self {
        Self {
            binary: "terraform".to_string(),
            no_color: true,
            max_retries: 3,
            time_between_retries_secs: 5,
            skip_teardown: false,
        }
    }
}

impl InfraprobeConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.probe.max_attempts == 0 {
            return Err(Error::Config("probe.max_attempts must be at least 1".into()));
        }
        if self.probe.attempt_timeout_secs == 0 {
            return Err(Error::Config("probe.attempt_timeout_secs must be positive".into()));
        }
        if self.terraform.binary.trim().is_empty() {
            return Err(Error::Config("terraform.binary must not be empty".into()));
        }
        Ok(())
    }
}
