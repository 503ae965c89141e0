//! Terraform CLI driver

use serde::Deserialize;
use std::collections::BTreeMap;
use std::process::Command;
use tracing::{debug, info, warn};

use crate::environment::{Outputs, Provisioner};
use crate::error::{ProvisionError, Result};
use crate::options::{RetryableError, TerraformOptions};

/// Runs Terraform commands for one configuration
#[derive(Debug, Clone)]
pub struct Terraform {
    options: TerraformOptions,
}

#[derive(Deserialize)]
struct OutputEntry {
    value: serde_json::Value,
}

impl Terraform {
    pub fn new(options: TerraformOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &TerraformOptions {
        &self.options
    }

    pub fn init(&self) -> Result<String> {
        self.run_with_retries("init", &self.options.init_args())
    }

    pub fn apply(&self) -> Result<String> {
        self.run_with_retries("apply", &self.options.apply_args())
    }

    /// `terraform init` followed by `terraform apply`
    pub fn init_and_apply(&self) -> Result<String> {
        self.init()?;
        self.apply()
    }

    pub fn destroy(&self) -> Result<String> {
        self.run_with_retries("destroy", &self.options.destroy_args())
    }

    /// Read one output; strings come back raw, anything else as compact JSON
    pub fn output(&self, name: &str) -> Result<String> {
        let stdout = self
            .run(&self.options.output_args(Some(name)))
            .map_err(|e| match e.output() {
                Some(out) if out.contains("not found") || out.contains("No outputs found") => {
                    ProvisionError::OutputNotFound(name.to_string())
                }
                _ => e,
            })?;
        let value: serde_json::Value = serde_json::from_str(stdout.trim())?;
        Ok(render_output(&value))
    }

    pub fn output_all(&self) -> Result<Outputs> {
        let stdout = self.run(&self.options.output_args(None))?;
        parse_outputs(&stdout)
    }

    fn run_with_retries(&self, name: &str, args: &[String]) -> Result<String> {
        let max_retries = if self.options.retryable_errors.is_empty() {
            0
        } else {
            self.options.max_retries
        };

        let mut retries = 0;
        loop {
            match self.run(args) {
                Ok(stdout) => return Ok(stdout),
                Err(e) => {
                    let Some(reason) = retryable_reason(&self.options.retryable_errors, &e) else {
                        return Err(e);
                    };
                    if retries >= max_retries {
                        warn!(command = name, retries, "Giving up on retryable error: {}", reason);
                        return Err(e);
                    }
                    retries += 1;
                    warn!(
                        command = name,
                        retry = retries,
                        max_retries,
                        "{}; retrying in {:?}",
                        reason,
                        self.options.time_between_retries
                    );
                    std::thread::sleep(self.options.time_between_retries);
                }
            }
        }
    }

    /// Run one command, returning stdout on success
    fn run(&self, args: &[String]) -> Result<String> {
        let command_line = format!("{} {}", self.options.binary, args.join(" "));
        debug!(dir = %self.options.dir.display(), "Running {}", command_line);

        let output = Command::new(&self.options.binary)
            .args(args)
            .current_dir(&self.options.dir)
            .envs(&self.options.env)
            .env("TF_INPUT", "0")
            .output()
            .map_err(|source| ProvisionError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ProvisionError::CommandFailed {
            command: command_line,
            exit_code: output.status.code(),
            output: format!("{}{}", stderr, stdout),
        })
    }
}

impl Provisioner for Terraform {
    fn apply(&self) -> Result<Outputs> {
        info!(dir = %self.options.dir.display(), "Applying terraform configuration");
        self.init_and_apply()?;
        self.output_all()
    }

    fn output(&self, name: &str) -> Result<String> {
        Terraform::output(self, name)
    }

    fn destroy(&self) -> Result<()> {
        info!(dir = %self.options.dir.display(), "Destroying terraform resources");
        Terraform::destroy(self).map(|_| ())
    }
}

fn retryable_reason<'a>(retryable: &'a [RetryableError], err: &ProvisionError) -> Option<&'a str> {
    let output = err.output()?;
    retryable
        .iter()
        .find(|r| r.pattern.is_match(output))
        .map(|r| r.description.as_str())
}

fn render_output(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse `terraform output -json` (all outputs)
pub fn parse_outputs(json: &str) -> Result<Outputs> {
    let trimmed = json.trim();
    if trimmed.is_empty() {
        return Ok(Outputs::new());
    }
    let entries: BTreeMap<String, OutputEntry> = serde_json::from_str(trimmed)?;
    Ok(entries
        .into_iter()
        .map(|(name, entry)| (name, render_output(&entry.value)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_outputs() {
        let json = r#"{
            "deso_dns": {"sensitive": false, "type": "string", "value": "deso-abc123.opsy.site"},
            "node_count": {"sensitive": false, "type": "number", "value": 2},
            "admin_keys": {"sensitive": true, "type": ["list", "string"], "value": ["BC1Y"]}
        }"#;
        let outputs = parse_outputs(json).unwrap();
        assert_eq!(outputs["deso_dns"], "deso-abc123.opsy.site");
        assert_eq!(outputs["node_count"], "2");
        assert_eq!(outputs["admin_keys"], r#"["BC1Y"]"#);
    }

    #[test]
    fn test_parse_empty_outputs() {
        assert!(parse_outputs("{}\n").unwrap().is_empty());
        assert!(parse_outputs("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_garbage_outputs() {
        assert!(matches!(
            parse_outputs("Warning: No outputs found"),
            Err(ProvisionError::OutputParse(_))
        ));
    }

    #[test]
    fn test_retryable_reason() {
        let retryable = vec![RetryableError::new(r".*TLS handshake timeout.*", "TLS timed out").unwrap()];
        let transient = ProvisionError::CommandFailed {
            command: "terraform init".into(),
            exit_code: Some(1),
            output: "Error: Failed to install provider\nnet/http: TLS handshake timeout".into(),
        };
        let permanent = ProvisionError::CommandFailed {
            command: "terraform apply".into(),
            exit_code: Some(1),
            output: "Error: Unsupported argument".into(),
        };
        assert_eq!(retryable_reason(&retryable, &transient), Some("TLS timed out"));
        assert_eq!(retryable_reason(&retryable, &permanent), None);
        assert_eq!(
            retryable_reason(&retryable, &ProvisionError::OutputNotFound("x".into())),
            None
        );
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let mut options = TerraformOptions::new(std::env::temp_dir());
        options.binary = "infraprobe-no-such-terraform".into();
        let terraform = Terraform::new(options).unwrap();
        assert!(matches!(terraform.init(), Err(ProvisionError::Spawn { .. })));
    }
}
