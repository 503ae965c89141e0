//! Terraform invocation options and argument construction

use infraprobe_common::TerraformSettings;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ProvisionError, Result};

/// Transient Terraform failures worth retrying, keyed by pattern.
///
/// Provider downloads and registry lookups fail intermittently in CI; none of
/// these indicate a problem with the configuration under test.
pub const DEFAULT_RETRYABLE_ERRORS: &[(&str, &str)] = &[
    (r".*read: connection reset by peer.*", "Connection reset while downloading"),
    (r".*TLS handshake timeout.*", "TLS handshake timed out"),
    (r".*unable to verify signature.*", "Transient network error fetching a plugin"),
    (r".*unable to verify checksum.*", "Transient network error fetching a plugin"),
    (r".*no provider exists with the given name.*", "Registry returned a transient error"),
    (r".*registry service is unreachable.*", "Registry unreachable"),
    (r".*Error installing provider.*", "Provider installation failed"),
    (r".*Failed to query available provider packages.*", "Provider index lookup failed"),
    (r".*timeout while waiting for plugin to start.*", "Plugin start timed out"),
    (r".*timed out waiting for server handshake.*", "Plugin handshake timed out"),
    (r"could not query provider registry for", "Registry query failed"),
];

/// A compiled retryable error pattern
#[derive(Debug, Clone)]
pub struct RetryableError {
    pub pattern: Regex,
    pub description: String,
}

impl RetryableError {
    pub fn new(pattern: &str, description: impl Into<String>) -> Result<Self> {
        let compiled = Regex::new(pattern).map_err(|source| ProvisionError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: compiled,
            description: description.into(),
        })
    }
}

/// How to run Terraform against one configuration directory
#[derive(Debug, Clone)]
pub struct TerraformOptions {
    /// Directory holding the configuration
    pub dir: PathBuf,

    /// `-var name=value`; strings pass through, other values are JSON-encoded
    pub vars: BTreeMap<String, serde_json::Value>,

    /// `-var-file` arguments
    pub var_files: Vec<PathBuf>,

    /// `-backend-config` arguments for `init`; empty means local state
    pub backend_config: BTreeMap<String, String>,

    /// Extra environment for every command
    pub env: BTreeMap<String, String>,

    pub no_color: bool,
    pub binary: String,

    pub retryable_errors: Vec<RetryableError>,
    pub max_retries: u32,
    pub time_between_retries: Duration,
}

impl TerraformOptions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::from_settings(dir, &TerraformSettings::default())
    }

    /// Options for `dir` using configured binary and retry policy.
    ///
    /// Retry counts only take effect once retryable errors are installed.
    pub fn from_settings(dir: impl Into<PathBuf>, settings: &TerraformSettings) -> Self {
        Self {
            dir: dir.into(),
            vars: BTreeMap::new(),
            var_files: Vec::new(),
            backend_config: BTreeMap::new(),
            env: BTreeMap::new(),
            no_color: settings.no_color,
            binary: settings.binary.clone(),
            retryable_errors: Vec::new(),
            max_retries: settings.max_retries,
            time_between_retries: Duration::from_secs(settings.time_between_retries_secs),
        }
    }

    /// Install [`DEFAULT_RETRYABLE_ERRORS`]
    pub fn with_default_retryable_errors(mut self) -> Self {
        for (pattern, description) in DEFAULT_RETRYABLE_ERRORS {
            // Patterns are constants; a failure here is a bug in the table
            if let Ok(err) = RetryableError::new(pattern, *description) {
                self.retryable_errors.push(err);
            }
        }
        self
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn with_backend_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.backend_config.insert(key.into(), value.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.binary.trim().is_empty() {
            return Err(ProvisionError::InvalidOptions("terraform binary must not be empty".into()));
        }
        if self.dir.as_os_str().is_empty() {
            return Err(ProvisionError::InvalidOptions("terraform dir must not be empty".into()));
        }
        Ok(())
    }

    pub fn init_args(&self) -> Vec<String> {
        let mut args = vec!["init".to_string(), "-upgrade=false".to_string(), "-input=false".to_string()];
        for (key, value) in &self.backend_config {
            args.push(format!("-backend-config={key}={value}"));
        }
        self.push_color(&mut args);
        args
    }

    pub fn apply_args(&self) -> Vec<String> {
        let mut args = vec![
            "apply".to_string(),
            "-input=false".to_string(),
            "-auto-approve".to_string(),
        ];
        self.push_vars(&mut args);
        self.push_color(&mut args);
        args
    }

    pub fn destroy_args(&self) -> Vec<String> {
        let mut args = vec![
            "destroy".to_string(),
            "-input=false".to_string(),
            "-auto-approve".to_string(),
        ];
        self.push_vars(&mut args);
        self.push_color(&mut args);
        args
    }

    /// `terraform output -json [name]`; output never needs colour
    pub fn output_args(&self, name: Option<&str>) -> Vec<String> {
        let mut args = vec!["output".to_string(), "-no-color".to_string(), "-json".to_string()];
        if let Some(name) = name {
            args.push(name.to_string());
        }
        args
    }

    fn push_vars(&self, args: &mut Vec<String>) {
        for (name, value) in &self.vars {
            args.push("-var".to_string());
            args.push(format!("{}={}", name, format_var(value)));
        }
        for file in &self.var_files {
            args.push(format!("-var-file={}", file.display()));
        }
    }

    fn push_color(&self, args: &mut Vec<String>) {
        if self.no_color {
            args.push("-no-color".to_string());
        }
    }
}

/// Render a variable value as Terraform expects it on the command line
fn format_var(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
