//! Error types for the Terraform driver

use thiserror::Error;

/// Result type alias for provisioning
pub type Result<T> = std::result::Result<T, ProvisionError>;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {exit_code:?}:\n{output}")]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("Terraform output {0:?} not found")]
    OutputNotFound(String),

    #[error("Failed to parse terraform output: {0}")]
    OutputParse(#[from] serde_json::Error),

    #[error("Invalid retryable error pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid provisioning options: {0}")]
    InvalidOptions(String),
}

impl ProvisionError {
    /// Combined stdout/stderr of a failed command, if any
    pub fn output(&self) -> Option<&str> {
        match self {
            ProvisionError::CommandFailed { output, .. } => Some(output),
            _ => None,
        }
    }
}
