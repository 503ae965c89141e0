//! Drives the Terraform wrapper against a shell script standing in for the
//! real binary, so command execution, retries and output parsing are covered
//! without cloud credentials.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use infraprobe_provider::{Environment, ProvisionError, Terraform, TerraformOptions};

/// Records every invocation to `calls.log` and answers like terraform would.
///
/// `init` fails with a transient registry error until `init.attempts`
/// reaches the number in `init.failures`.
const FAKE_TERRAFORM: &str = r#"#!/bin/sh
dir="$(pwd)"
echo "$*" >> "$dir/calls.log"
case "$1" in
  init)
    failures=$(cat "$dir/init.failures" 2>/dev/null || echo 0)
    attempts=$(cat "$dir/init.attempts" 2>/dev/null || echo 0)
    attempts=$((attempts + 1))
    echo "$attempts" > "$dir/init.attempts"
    if [ "$attempts" -le "$failures" ]; then
      echo "Error: Failed to query available provider packages" >&2
      exit 1
    fi
    echo "Terraform has been successfully initialized!"
    ;;
  apply)
    if [ -f "$dir/apply.broken" ]; then
      echo "Error: Unsupported argument" >&2
      exit 1
    fi
    echo "Apply complete! Resources: 3 added, 0 changed, 0 destroyed."
    ;;
  destroy)
    echo "Destroy complete! Resources: 3 destroyed."
    ;;
  output)
    if [ -n "$4" ]; then
      if [ "$4" = "deso_dns" ]; then
        echo '"deso-abc123.opsy.site"'
      else
        echo "Error: Output \"$4\" not found" >&2
        exit 1
      fi
    else
      echo '{"deso_dns":{"sensitive":false,"type":"string","value":"deso-abc123.opsy.site"}}'
    fi
    ;;
esac
"#;

struct Fixture {
    dir: tempfile::TempDir,
    binary: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let binary = dir.path().join("fake-terraform");
        std::fs::write(&binary, FAKE_TERRAFORM).expect("write fake terraform");
        let mut perms = std::fs::metadata(&binary).expect("stat").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&binary, perms).expect("chmod");
        Self { dir, binary }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn options(&self) -> TerraformOptions {
        let mut options = TerraformOptions::new(self.path())
            .with_var("name", "deso-abc123")
            .with_default_retryable_errors();
        options.binary = self.binary.display().to_string();
        options.time_between_retries = Duration::ZERO;
        options
    }

    fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

#[test]
fn environment_applies_reads_outputs_and_destroys() {
    let fixture = Fixture::new();
    let terraform = Terraform::new(fixture.options()).unwrap();

    {
        let env = Environment::provision(terraform).unwrap();
        assert_eq!(env.output("deso_dns").unwrap(), "deso-abc123.opsy.site");
    }

    let calls = fixture.calls();
    let verbs: Vec<&str> = calls
        .iter()
        .map(|c| c.split_whitespace().next().unwrap_or_default())
        .collect();
    assert_eq!(verbs, vec!["init", "apply", "output", "destroy"]);
    assert!(calls[1].contains("-var name=deso-abc123"));
}

#[test]
fn transient_init_errors_are_retried() {
    let fixture = Fixture::new();
    std::fs::write(fixture.path().join("init.failures"), "2").unwrap();
    let terraform = Terraform::new(fixture.options()).unwrap();

    terraform.init().unwrap();

    let inits = fixture.calls().iter().filter(|c| c.starts_with("init")).count();
    assert_eq!(inits, 3);
}

#[test]
fn retries_are_bounded() {
    let fixture = Fixture::new();
    std::fs::write(fixture.path().join("init.failures"), "10").unwrap();
    let mut options = fixture.options();
    options.max_retries = 2;
    let terraform = Terraform::new(options).unwrap();

    let err = terraform.init().unwrap_err();

    assert!(matches!(err, ProvisionError::CommandFailed { .. }));
    let inits = fixture.calls().iter().filter(|c| c.starts_with("init")).count();
    assert_eq!(inits, 3);
}

#[test]
fn permanent_errors_are_not_retried_and_still_destroy() {
    let fixture = Fixture::new();
    std::fs::write(fixture.path().join("apply.broken"), "").unwrap();
    let terraform = Terraform::new(fixture.options()).unwrap();

    let err = match Environment::provision(terraform) {
        Ok(_) => panic!("apply should fail"),
        Err(e) => e,
    };

    assert!(err.to_string().contains("Unsupported argument"));
    let calls = fixture.calls();
    assert_eq!(calls.iter().filter(|c| c.starts_with("apply")).count(), 1);
    assert_eq!(calls.last().map(|c| c.starts_with("destroy")), Some(true));
}

#[test]
fn missing_output_is_reported_by_name() {
    let fixture = Fixture::new();
    let terraform = Terraform::new(fixture.options()).unwrap();

    match terraform.output("backend_url") {
        Err(ProvisionError::OutputNotFound(name)) => assert_eq!(name, "backend_url"),
        other => panic!("expected OutputNotFound, got {:?}", other),
    }
}
