//! Scenario runner: provision, assert outputs, probe, tear down

use futures::future::join_all;
use infraprobe_common::{InfraprobeConfig, ProbeOutcome, ProbeReport, Prober};
use infraprobe_provider::{unique_id, Environment, Outputs, Terraform, TerraformOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::scenario::{Check, RetryPolicy, Scenario, TemplateContext};

/// Result of one output assertion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputResult {
    pub name: String,
    pub success: bool,
    pub actual: Option<String>,
    pub expected: Option<String>,
    pub error: Option<String>,
}

/// Result of one endpoint check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub url: String,
    pub validator: String,
    pub success: bool,
    pub report: Option<ProbeReport>,
    pub error: Option<String>,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub unique_id: String,
    pub success: bool,
    pub duration_ms: u64,
    pub outputs: Vec<OutputResult>,
    pub checks: Vec<CheckResult>,
    pub error: Option<String>,
}

impl ScenarioResult {
    fn new(name: &str, unique_id: &str) -> Self {
        Self {
            name: name.to_string(),
            unique_id: unique_id.to_string(),
            success: false,
            duration_ms: 0,
            outputs: Vec::new(),
            checks: Vec::new(),
            error: None,
        }
    }

    /// Keep the first error; later ones (teardown) are logged only
    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
        } else {
            warn!(scenario = %self.name, "Additional failure: {}", message);
        }
    }
}

/// Result of running a set of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

/// Runs scenarios with a shared configuration
pub struct ScenarioRunner {
    config: InfraprobeConfig,
    prober: Prober,
    cancel: CancellationToken,
    output_dir: PathBuf,
}

impl ScenarioRunner {
    pub fn new(config: InfraprobeConfig) -> Self {
        Self {
            config,
            prober: Prober::http(),
            cancel: CancellationToken::new(),
            output_dir: PathBuf::from("test-results"),
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn config(&self) -> &InfraprobeConfig {
        &self.config
    }

    /// Cancelling this token stops in-flight probes; teardown still runs
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every scenario in order
    pub async fn run_all(&self, scenarios: &[Scenario]) -> SuiteResult {
        let start = Instant::now();
        let mut results = Vec::with_capacity(scenarios.len());

        info!("Running {} scenario(s)...", scenarios.len());

        for scenario in scenarios {
            if self.cancel.is_cancelled() {
                warn!(scenario = %scenario.name, "Run cancelled, skipping");
            }
            let result = self.run_scenario(scenario).await;
            if result.success {
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        let passed = results.iter().filter(|r| r.success).count();
        let failed = results.len() - passed;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("Scenario results: {} passed, {} failed ({} ms)", passed, failed, duration_ms);

        SuiteResult {
            total: results.len(),
            passed,
            failed,
            duration_ms,
            results,
        }
    }

    /// Run a single scenario. Failures are reported in the result, not as errors.
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        let start = Instant::now();
        let mut ctx = TemplateContext {
            unique_id: unique_id().to_ascii_lowercase(),
            ..Default::default()
        };
        let mut result = ScenarioResult::new(&scenario.name, &ctx.unique_id);

        debug!(scenario = %scenario.name, unique_id = %ctx.unique_id, "Running scenario");

        // Nothing is provisioned once the run has been cancelled
        if self.cancel.is_cancelled() {
            result.fail("cancelled before provisioning".to_string());
            result.duration_ms = start.elapsed().as_millis() as u64;
            return result;
        }

        let env = match self.provision(scenario, &ctx).await {
            Ok(env) => env,
            Err(e) => {
                result.fail(e.to_string());
                result.duration_ms = start.elapsed().as_millis() as u64;
                return result;
            }
        };

        if let Some(env) = &env {
            ctx.outputs = env.outputs().clone();
        }

        result.outputs = assert_outputs(scenario, &ctx, env.as_ref().map(|e| e.outputs()));
        if let Some(failed) = result.outputs.iter().find(|o| !o.success) {
            result.fail(format!(
                "output {} assertion failed: {}",
                failed.name,
                failed.error.as_deref().unwrap_or("mismatch")
            ));
        } else {
            result.checks = self.run_checks(&scenario.checks, &ctx).await;
            if let Some(failed) = result.checks.iter().find(|c| !c.success) {
                result.fail(format!(
                    "check {} failed: {}",
                    failed.name,
                    failed.error.as_deref().unwrap_or("no match")
                ));
            }
        }

        if let Some(env) = env {
            match tokio::task::spawn_blocking(move || env.teardown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => result.fail(format!("teardown failed: {}", e)),
                Err(e) => result.fail(format!("teardown task failed: {}", e)),
            }
        }

        result.success = result.error.is_none();
        result.duration_ms = start.elapsed().as_millis() as u64;
        result
    }

    async fn provision(
        &self,
        scenario: &Scenario,
        ctx: &TemplateContext,
    ) -> E2eResult<Option<Environment<Terraform>>> {
        let (Some(section), Some(dir)) = (scenario.terraform.as_ref(), scenario.rendered_terraform_dir(ctx)?) else {
            return Ok(None);
        };

        if !dir.is_dir() {
            return Err(E2eError::TerraformDirNotFound(dir.display().to_string()));
        }

        let mut options = TerraformOptions::from_settings(&dir, &self.config.terraform);
        if section.retryable_errors == RetryPolicy::Default {
            options = options.with_default_retryable_errors();
        }
        for (name, value) in &section.vars {
            options.vars.insert(name.clone(), ctx.render_value(value)?);
        }
        options.var_files = section.var_files.clone();
        options.backend_config = section.backend_config.clone();
        options.env = section.env.clone();

        let terraform = Terraform::new(options)?;
        let skip_teardown = self.config.terraform.skip_teardown;

        info!(scenario = %scenario.name, dir = %dir.display(), "Provisioning");
        let env = tokio::task::spawn_blocking(move || {
            Environment::provision_with(terraform, skip_teardown)
        })
        .await??;

        Ok(Some(env))
    }

    /// Probe all checks concurrently
    async fn run_checks(&self, checks: &[Check], ctx: &TemplateContext) -> Vec<CheckResult> {
        join_all(checks.iter().map(|check| self.run_check(check, ctx))).await
    }

    async fn run_check(&self, check: &Check, ctx: &TemplateContext) -> CheckResult {
        let validator = check.expect.validator();
        let mut result = CheckResult {
            name: check.name.clone(),
            url: check.url.clone(),
            validator: validator.description().to_string(),
            success: false,
            report: None,
            error: None,
        };

        let url = match ctx.render(&check.url) {
            Ok(url) => url,
            Err(e) => {
                result.error = Some(e.to_string());
                return result;
            }
        };
        result.url = url.clone();

        let request = check.request(url, &self.config.probe, &self.config.tls);
        let report = self
            .prober
            .probe_until_cancelled(&request, &validator, &self.cancel)
            .await;

        match report {
            Ok(report) => {
                result.success = report.is_success();
                if !result.success {
                    result.error = Some(describe_failure(&report));
                }
                result.report = Some(report);
            }
            Err(e) => result.error = Some(e.to_string()),
        }
        result
    }

    /// Write suite results to JSON file
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("scenario-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }

    /// Load scenarios from `dir`, keeping those tagged `tag` when given
    pub fn load(dir: &Path, tag: Option<&str>) -> E2eResult<Vec<Scenario>> {
        let scenarios = Scenario::load_all(dir)?;
        Ok(match tag {
            Some(tag) => Scenario::filter_by_tag(&scenarios, tag).into_iter().cloned().collect(),
            None => scenarios,
        })
    }
}

fn assert_outputs(
    scenario: &Scenario,
    ctx: &TemplateContext,
    outputs: Option<&Outputs>,
) -> Vec<OutputResult> {
    scenario
        .outputs
        .iter()
        .map(|assertion| {
            let actual = outputs.and_then(|o| o.get(&assertion.name)).cloned();
            let expected = match assertion.equals.as_deref().map(|e| ctx.render(e)).transpose() {
                Ok(expected) => expected,
                Err(e) => {
                    return OutputResult {
                        name: assertion.name.clone(),
                        success: false,
                        actual,
                        expected: assertion.equals.clone(),
                        error: Some(e.to_string()),
                    }
                }
            };

            let error = match (&actual, &expected) {
                (None, _) => Some(format!("output {} not found", assertion.name)),
                (Some(actual), Some(expected)) if actual != expected => Some(
                    E2eError::OutputMismatch {
                        name: assertion.name.clone(),
                        expected: expected.clone(),
                        actual: actual.clone(),
                    }
                    .to_string(),
                ),
                _ => None,
            };

            OutputResult {
                name: assertion.name.clone(),
                success: error.is_none(),
                actual,
                expected,
                error,
            }
        })
        .collect()
}

fn describe_failure(report: &ProbeReport) -> String {
    match report.outcome {
        ProbeOutcome::Cancelled => format!("cancelled after {} attempt(s)", report.attempts),
        _ => match (&report.last_error, report.last_status) {
            (Some(e), _) => format!("no match after {} attempt(s), last error: {}", report.attempts, e),
            (None, Some(status)) => format!(
                "no match after {} attempt(s), last status {}",
                report.attempts, status
            ),
            (None, None) => format!("no match after {} attempt(s)", report.attempts),
        },
    }
}
