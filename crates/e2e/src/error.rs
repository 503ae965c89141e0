//! Error types for scenario runs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Scenario parse error: {0}")]
    ScenarioParse(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Output {name} mismatch: expected {expected:?}, got {actual:?}")]
    OutputMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Terraform directory not found: {0}")]
    TerraformDirNotFound(String),

    #[error("Provisioning failed: {0}")]
    Provision(#[from] infraprobe_provider::ProvisionError),

    #[error("Probe error: {0}")]
    Probe(#[from] infraprobe_common::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
