//! infraprobe common library
//!
//! The bounded retry prober and the types shared by the Terraform driver,
//! the scenario runner and the CLI.

pub mod config;
pub mod error;
pub mod prober;
pub mod transport;
pub mod types;
pub mod validator;

// Re-export commonly used types
pub use config::{InfraprobeConfig, ProbeDefaults, TerraformSettings};
pub use error::{Error, Result, TransportError};
pub use prober::Prober;
pub use transport::{HttpTransport, Transport};
pub use types::*;
pub use validator::{Expectation, Validator};

/// infraprobe version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default directory for user configuration
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".infraprobe")
}

/// Default configuration file
pub fn default_config_path() -> std::path::PathBuf {
    default_config_dir().join("config.toml")
}

/// Home directory helper
mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}
