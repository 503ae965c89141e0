//! infraprobe scenario framework
//!
//! Runs declarative deployment checks:
//! - Provisions a Terraform configuration inside a scoped environment
//! - Asserts on Terraform outputs
//! - Probes endpoints with bounded retries until a validator matches
//! - Tears the environment down on every exit path
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ScenarioRunner (Rust)                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  run_scenario(scenario)                                     │
//! │    ├── Environment::provision(Terraform) -> outputs         │
//! │    ├── assert outputs (equals, templates)                   │
//! │    ├── join_all(checks) -> Prober::probe_until_cancelled    │
//! │    └── Environment::teardown()                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario (YAML)                                            │
//! │    ├── name, description, tags                              │
//! │    ├── terraform { dir, vars, backend_config, ... }         │
//! │    ├── outputs: [{ name, equals? }]                         │
//! │    └── checks: [{ name, url, max_attempts?, expect }]       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod runner;
pub mod scenario;

pub use error::{E2eError, E2eResult};
pub use runner::{CheckResult, ScenarioResult, ScenarioRunner, SuiteResult};
pub use scenario::{Check, Scenario, TemplateContext};
