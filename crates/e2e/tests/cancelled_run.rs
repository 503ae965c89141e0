//! A cancelled runner must not provision anything: scenarios run against a
//! shell script standing in for terraform that logs every invocation.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use infraprobe_common::InfraprobeConfig;
use infraprobe_e2e::{Scenario, ScenarioRunner};

const FAKE_TERRAFORM: &str = r#"#!/bin/sh
echo "$1" >> "$(pwd)/calls.log"
case "$1" in
  output)
    echo '{"deso_dns":{"sensitive":false,"type":"string","value":"deso-abc123.opsy.site"}}'
    ;;
esac
"#;

const SCENARIO: &str = r#"
name: fake-deployment
terraform:
  dir: tf
  vars:
    name: "deso-{{unique_id}}"
outputs:
  - name: deso_dns
checks: []
"#;

struct Workspace {
    dir: tempfile::TempDir,
    binary: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir(dir.path().join("tf")).expect("create tf dir");
        std::fs::write(dir.path().join("fake.yaml"), SCENARIO).expect("write scenario");

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

    fn scenario(&self) -> Scenario {
        Scenario::from_file(&self.path().join("fake.yaml")).expect("parse scenario")
    }

    fn runner(&self) -> ScenarioRunner {
        let mut config = InfraprobeConfig::default();
        config.terraform.binary = self.binary.display().to_string();
        ScenarioRunner::new(config).with_output_dir(self.path().join("results"))
    }

    fn verbs(&self) -> Vec<String> {
        std::fs::read_to_string(self.path().join("tf").join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn count(&self, verb: &str) -> usize {
        self.verbs().iter().filter(|v| *v == verb).count()
    }
}

#[tokio::test]
async fn uncancelled_run_provisions_and_destroys() {
    let workspace = Workspace::new();
    let runner = workspace.runner();

    let result = runner.run_scenario(&workspace.scenario()).await;

    assert!(result.success, "scenario failed: {:?}", result.error);
    assert_eq!(workspace.verbs(), vec!["init", "apply", "output", "destroy"]);
}

#[tokio::test]
async fn cancelled_run_never_applies() {
    let workspace = Workspace::new();
    let runner = workspace.runner();
    runner.cancel_token().cancel();

    let scenario = workspace.scenario();
    let suite = runner.run_all(&[scenario.clone(), scenario]).await;

    assert_eq!(suite.total, 2);
    assert_eq!(suite.failed, 2);
    for result in &suite.results {
        assert!(result.error.as_deref().unwrap_or_default().contains("cancelled"));
    }
    assert_eq!(workspace.count("apply"), 0);
    assert!(workspace.verbs().is_empty());
}
