//! infraprobe Terraform driver
//!
//! Runs the Terraform CLI against a configuration directory, retries known
//! transient failures, reads outputs, and scopes the provisioned resources
//! to an [`Environment`] guard that always tears them down.

pub mod environment;
pub mod error;
pub mod options;
pub mod random;
pub mod terraform;

pub use environment::{Environment, Outputs, Provisioner};
pub use error::{ProvisionError, Result};
pub use options::{RetryableError, TerraformOptions, DEFAULT_RETRYABLE_ERRORS};
pub use random::{unique_id, unique_name};
pub use terraform::Terraform;
