//! Declarative YAML scenarios
//!
//! A scenario provisions a Terraform configuration, asserts on its outputs,
//! and probes endpoints built from those outputs.

use infraprobe_common::{Expectation, ProbeDefaults, ProbeRequest, TlsSettings};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use crate::error::{E2eError, E2eResult};

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Infrastructure to provision; checks run against fixed URLs when absent
    #[serde(default)]
    pub terraform: Option<TerraformSection>,

    /// Assertions on Terraform outputs, evaluated before any check
    #[serde(default)]
    pub outputs: Vec<OutputAssertion>,

    /// Endpoints to probe
    pub checks: Vec<Check>,

    /// File this scenario was loaded from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TerraformSection {
    /// Configuration directory, relative to the scenario file
    pub dir: PathBuf,

    #[serde(default)]
    pub vars: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub var_files: Vec<PathBuf>,

    /// Remote backend settings; local state when empty
    #[serde(default)]
    pub backend_config: BTreeMap<String, String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub retryable_errors: RetryPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Retry the well-known transient Terraform failures
    #[default]
    Default,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputAssertion {
    pub name: String,

    /// Expected value; may use templates
    #[serde(default)]
    pub equals: Option<String>,
}

/// One endpoint probe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Check {
    pub name: String,

    /// Target URL; may use templates
    pub url: String,

    #[serde(default)]
    pub max_attempts: Option<u32>,

    #[serde(default)]
    pub delay_secs: Option<u64>,

    #[serde(default)]
    pub attempt_timeout_secs: Option<u64>,

    #[serde(default)]
    pub deadline_secs: Option<u64>,

    /// Overrides the configured TLS settings
    #[serde(default)]
    pub tls: Option<TlsSettings>,

    #[serde(default)]
    pub expect: Expectation,
}

impl Check {
    /// Build a probe request for an already rendered URL
    pub fn request(&self, url: String, defaults: &ProbeDefaults, tls: &TlsSettings) -> ProbeRequest {
        let mut request = defaults.request(url, self.tls.as_ref().unwrap_or(tls));
        if let Some(n) = self.max_attempts {
            request.max_attempts = n;
        }
        if let Some(secs) = self.delay_secs {
            request.delay = Duration::from_secs(secs);
        }
        if let Some(secs) = self.attempt_timeout_secs {
            request.attempt_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.deadline_secs {
            request.deadline = Some(Duration::from_secs(secs));
        }
        request
    }
}

impl Scenario {
    /// Parse a scenario from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let scenario: Self = serde_yaml::from_str(yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut scenario = Self::from_yaml(&content)
            .map_err(|e| E2eError::ScenarioParse(format!("{}: {}", path.display(), e)))?;
        scenario.source = Some(path.to_path_buf());
        Ok(scenario)
    }

    /// Load all scenarios from a directory, sorted by name
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut scenarios = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            scenarios.push(Self::from_file(entry.path())?);
        }

        scenarios.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(scenarios)
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(scenarios: &'a [Self], tag: &str) -> Vec<&'a Self> {
        scenarios.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Terraform directory resolved against the scenario file, placeholders unrendered
    pub fn terraform_dir(&self) -> Option<PathBuf> {
        let section = self.terraform.as_ref()?;
        Some(self.resolve(&section.dir))
    }

    /// Terraform directory with placeholders rendered, then resolved
    pub fn rendered_terraform_dir(&self, ctx: &TemplateContext) -> E2eResult<Option<PathBuf>> {
        let Some(section) = self.terraform.as_ref() else {
            return Ok(None);
        };
        let dir = ctx.render(&section.dir.to_string_lossy())?;
        Ok(Some(self.resolve(Path::new(&dir))))
    }

    fn resolve(&self, dir: &Path) -> PathBuf {
        if dir.is_absolute() {
            return dir.to_path_buf();
        }
        let base = self
            .source
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new("."));
        base.join(dir)
    }

    fn validate(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::ScenarioParse("scenario name must not be empty".into()));
        }
        if self.checks.is_empty() && self.outputs.is_empty() {
            return Err(E2eError::ScenarioParse(format!(
                "scenario {} has neither checks nor output assertions",
                self.name
            )));
        }
        if self.terraform.is_none() && !self.outputs.is_empty() {
            return Err(E2eError::ScenarioParse(format!(
                "scenario {} asserts outputs without a terraform section",
                self.name
            )));
        }
        Ok(())
    }
}

/// Values available to `{{...}}` placeholders
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub unique_id: String,
    pub outputs: BTreeMap<String, String>,
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_]+)(?:\.([A-Za-z0-9_\-]+))?\s*\}\}")
            .expect("placeholder pattern is valid")
    })
}

impl TemplateContext {
    /// Substitute `{{unique_id}}`, `{{output.NAME}}` and `{{env.NAME}}`
    pub fn render(&self, template: &str) -> E2eResult<String> {
        let mut rendered = String::with_capacity(template.len());
        let mut last = 0;

        for caps in placeholder().captures_iter(template) {
            let whole = caps.get(0).expect("group 0 always matches");
            rendered.push_str(&template[last..whole.start()]);

            let kind = &caps[1];
            let key = caps.get(2).map(|m| m.as_str());
            let value = match (kind, key) {
                ("unique_id", None) => self.unique_id.clone(),
                ("output", Some(name)) => self.outputs.get(name).cloned().ok_or_else(|| {
                    E2eError::Template(format!("output {name:?} is not available"))
                })?,
                ("env", Some(name)) => std::env::var(name).map_err(|_| {
                    E2eError::Template(format!("environment variable {name} is not set"))
                })?,
                _ => {
                    return Err(E2eError::Template(format!(
                        "unknown placeholder {:?}",
                        whole.as_str()
                    )))
                }
            };
            rendered.push_str(&value);
            last = whole.end();
        }

        rendered.push_str(&template[last..]);
        Ok(rendered)
    }

    /// Render every string inside a JSON value
    pub fn render_value(&self, value: &serde_json::Value) -> E2eResult<serde_json::Value> {
        Ok(match value {
            serde_json::Value::String(s) => serde_json::Value::String(self.render(s)?),
            serde_json::Value::Array(items) => serde_json::Value::Array(
                items.iter().map(|v| self.render_value(v)).collect::<E2eResult<_>>()?,
            ),
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), self.render_value(v)?)))
                    .collect::<E2eResult<_>>()?,
            ),
            other => other.clone(),
        })
    }
}
