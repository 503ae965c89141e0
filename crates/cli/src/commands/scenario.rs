//! Scenario Commands
//!
//! Run and list YAML deployment scenarios.

use anyhow::{Context, Result};
use clap::Subcommand;
use infraprobe_common::InfraprobeConfig;
use infraprobe_e2e::{Scenario, ScenarioRunner};
use std::path::PathBuf;

use crate::output::{print_error, print_list, print_success, print_warning, OutputFormat, ScenarioSummary};

#[derive(Subcommand)]
pub enum ScenarioCommands {
    /// Provision, probe and tear down one scenario file or a directory of them
    Run {
        /// Scenario file or directory
        path: PathBuf,

        /// Only run scenarios with this tag
        #[arg(short, long)]
        tag: Option<String>,

        /// Leave resources in place after the run
        #[arg(long)]
        skip_teardown: bool,

        /// Directory for scenario-results.json
        #[arg(short, long, default_value = "test-results")]
        output: PathBuf,
    },

    /// List scenarios in a directory
    List {
        /// Scenarios directory
        dir: PathBuf,

        /// Only list scenarios with this tag
        #[arg(short, long)]
        tag: Option<String>,
    },
}

/// Returns whether every scenario passed
pub async fn execute(cmd: ScenarioCommands, config: InfraprobeConfig, format: OutputFormat) -> Result<bool> {
    match cmd {
        ScenarioCommands::Run {
            path,
            tag,
            skip_teardown,
            output,
        } => execute_run(path, tag, skip_teardown, output, config, format).await,
        ScenarioCommands::List { dir, tag } => {
            let scenarios = ScenarioRunner::load(&dir, tag.as_deref())
                .with_context(|| format!("Failed to load scenarios from {}", dir.display()))?;
            let rows: Vec<ScenarioSummary> = scenarios.iter().map(ScenarioSummary::from).collect();
            print_list(&rows, format);
            Ok(true)
        }
    }
}

fn select_by_tag(scenarios: Vec<Scenario>, tag: Option<&str>) -> Vec<Scenario> {
    match tag {
        Some(tag) => Scenario::filter_by_tag(&scenarios, tag).into_iter().cloned().collect(),
        None => scenarios,
    }
}

async fn execute_run(
    path: PathBuf,
    tag: Option<String>,
    skip_teardown: bool,
    output: PathBuf,
    mut config: InfraprobeConfig,
    format: OutputFormat,
) -> Result<bool> {
    let scenarios = if path.is_dir() {
        ScenarioRunner::load(&path, tag.as_deref())?
    } else {
        let scenario = Scenario::from_file(&path)
            .with_context(|| format!("Failed to load scenario {}", path.display()))?;
        select_by_tag(vec![scenario], tag.as_deref())
    };

    if scenarios.is_empty() {
        print_warning("No scenarios matched");
        return Ok(true);
    }

    if skip_teardown {
        config.terraform.skip_teardown = true;
        print_warning("Teardown disabled: provisioned resources will be left running");
    }

    let runner = ScenarioRunner::new(config).with_output_dir(output);
    let cancel = runner.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let suite = runner.run_all(&scenarios).await;
    runner.write_results(&suite)?;

    for result in &suite.results {
        if !result.checks.is_empty() {
            print_list(&result.checks, format);
        }
        match &result.error {
            None => print_success(&format!("{} passed ({} ms)", result.name, result.duration_ms)),
            Some(e) => print_error(&format!("{} failed: {}", result.name, e)),
        }
    }

    Ok(suite.failed == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(name: &str, tags: &[&str]) -> Scenario {
        let yaml = format!(
            "name: {name}\ntags: [{}]\nchecks:\n  - name: frontend\n    url: http://127.0.0.1/\n",
            tags.join(", ")
        );
        Scenario::from_yaml(&yaml).unwrap()
    }

    #[test]
    fn test_tag_applies_to_single_file() {
        let smoke = vec![tagged("complete-example", &["aws", "smoke"])];
        assert_eq!(select_by_tag(smoke.clone(), Some("smoke")).len(), 1);
        assert!(select_by_tag(smoke.clone(), Some("nightly")).is_empty());
        assert_eq!(select_by_tag(smoke, None).len(), 1);
    }
}
