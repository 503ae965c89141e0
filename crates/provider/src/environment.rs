//! Scoped provisioned environments
//!
//! An [`Environment`] owns whatever a [`Provisioner`] created and destroys it
//! exactly once: on [`Environment::teardown`], on drop, or while unwinding
//! from a panic. A failed apply is torn down before the error is returned,
//! so partially created resources do not leak.

use std::collections::BTreeMap;
use tracing::{error, info, warn};

use crate::error::{ProvisionError, Result};

/// Output name to rendered value
pub type Outputs = BTreeMap<String, String>;

/// Something that can create and destroy an environment
pub trait Provisioner: Send + Sync {
    /// Create or update resources, returning all outputs
    fn apply(&self) -> Result<Outputs>;

    /// Read a single output
    fn output(&self, name: &str) -> Result<String>;

    /// Remove everything `apply` created
    fn destroy(&self) -> Result<()>;
}

/// A provisioned environment with guaranteed teardown
pub struct Environment<P: Provisioner> {
    provisioner: P,
    outputs: Outputs,
    skip_teardown: bool,
    torn_down: bool,
}

impl<P: Provisioner> Environment<P> {
    /// Apply and return the guard
    pub fn provision(provisioner: P) -> Result<Self> {
        Self::provision_with(provisioner, false)
    }

    /// Apply; with `skip_teardown` the resources outlive the guard
    pub fn provision_with(provisioner: P, skip_teardown: bool) -> Result<Self> {
        // Guard exists before apply so a failed apply is still destroyed
        let mut env = Self {
            provisioner,
            outputs: Outputs::new(),
            skip_teardown,
            torn_down: false,
        };
        env.outputs = env.provisioner.apply()?;
        info!(outputs = env.outputs.len(), "Environment provisioned");
        Ok(env)
    }

    /// Output captured at apply time, or read from the provisioner
    pub fn output(&self, name: &str) -> Result<String> {
        match self.outputs.get(name) {
            Some(value) => Ok(value.clone()),
            None => self.provisioner.output(name),
        }
    }

    /// Like [`Environment::output`], but only from what apply returned
    pub fn captured_output(&self, name: &str) -> Result<&str> {
        self.outputs
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ProvisionError::OutputNotFound(name.to_string()))
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn provisioner(&self) -> &P {
        &self.provisioner
    }

    /// Destroy now and report the result
    pub fn teardown(mut self) -> Result<()> {
        self.destroy_once()
    }

    fn destroy_once(&mut self) -> Result<()> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;

        if self.skip_teardown {
            warn!("Skipping teardown; provisioned resources are left running");
            return Ok(());
        }

        info!("Tearing down environment");
        self.provisioner.destroy()
    }
}

impl<P: Provisioner> Drop for Environment<P> {
    fn drop(&mut self) {
        if let Err(e) = self.destroy_once() {
            error!("Teardown failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct FakeProvisioner {
        applies: Arc<AtomicUsize>,
        destroys: Arc<AtomicUsize>,
        fail_apply: bool,
        fail_destroy: bool,
    }

    impl FakeProvisioner {
        fn destroys(&self) -> usize {
            self.destroys.load(Ordering::SeqCst)
        }
    }

    impl Provisioner for FakeProvisioner {
        fn apply(&self) -> Result<Outputs> {
            self.applies.fetch_add(1, Ordering::SeqCst);
            if self.fail_apply {
                return Err(ProvisionError::CommandFailed {
                    command: "terraform apply".into(),
                    exit_code: Some(1),
                    output: "Error: creating Route53 record".into(),
                });
            }
            Ok(Outputs::from([("deso_dns".to_string(), "deso-abc123.opsy.site".to_string())]))
        }

        fn output(&self, name: &str) -> Result<String> {
            match name {
                "late" => Ok("computed".into()),
                _ => Err(ProvisionError::OutputNotFound(name.into())),
            }
        }

        fn destroy(&self) -> Result<()> {
            self.destroys.fetch_add(1, Ordering::SeqCst);
            if self.fail_destroy {
                return Err(ProvisionError::CommandFailed {
                    command: "terraform destroy".into(),
                    exit_code: Some(1),
                    output: "Error: DependencyViolation".into(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_drop_destroys() {
        let fake = FakeProvisioner::default();
        {
            let env = Environment::provision(fake.clone()).unwrap();
            assert_eq!(env.output("deso_dns").unwrap(), "deso-abc123.opsy.site");
            assert_eq!(fake.destroys(), 0);
        }
        assert_eq!(fake.destroys(), 1);
    }

    #[test]
    fn test_explicit_teardown_destroys_once() {
        let fake = FakeProvisioner::default();
        let env = Environment::provision(fake.clone()).unwrap();
        env.teardown().unwrap();
        assert_eq!(fake.destroys(), 1);
    }

    #[test]
    fn test_failed_apply_still_destroys() {
        let fake = FakeProvisioner {
            fail_apply: true,
            ..Default::default()
        };
        assert!(Environment::provision(fake.clone()).is_err());
        assert_eq!(fake.destroys(), 1);
    }

    #[test]
    fn test_panic_destroys() {
        let fake = FakeProvisioner::default();
        let result = catch_unwind(AssertUnwindSafe(|| {
            let env = Environment::provision(fake.clone()).unwrap();
            assert_eq!(env.output("deso_dns").unwrap(), "wrong.example.com");
        }));
        assert!(result.is_err());
        assert_eq!(fake.destroys(), 1);
    }

    #[test]
    fn test_skip_teardown() {
        let fake = FakeProvisioner::default();
        let env = Environment::provision_with(fake.clone(), true).unwrap();
        env.teardown().unwrap();
        assert_eq!(fake.destroys(), 0);
    }

    #[test]
    fn test_teardown_error_is_reported() {
        let fake = FakeProvisioner {
            fail_destroy: true,
            ..Default::default()
        };
        let env = Environment::provision(fake.clone()).unwrap();
        assert!(env.teardown().is_err());
        // Drop after a failed teardown does not retry
        assert_eq!(fake.destroys(), 1);
    }

    #[test]
    fn test_output_falls_back_to_provisioner() {
        let env = Environment::provision(FakeProvisioner::default()).unwrap();
        assert_eq!(env.output("late").unwrap(), "computed");
        assert!(matches!(
            env.captured_output("late"),
            Err(ProvisionError::OutputNotFound(_))
        ));
        assert!(env.output("missing").is_err());
    }
}
