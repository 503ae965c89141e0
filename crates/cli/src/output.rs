//! Output formatting for CLI

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use infraprobe_common::ProbeReport;
use infraprobe_e2e::{CheckResult, Scenario};
use serde::Serialize;

/// Longest body excerpt shown in tables
const BODY_EXCERPT_LENGTH: usize = 60;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

impl TableDisplay for ProbeReport {
    fn headers() -> Vec<&'static str> {
        vec!["Address", "Outcome", "Attempts", "Last Status", "Last Error", "Elapsed", "Body"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.address.clone(),
            self.outcome.to_string(),
            format!("{}/{}", self.attempts, self.max_attempts),
            self.last_status.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
            self.last_error.as_ref().map(|e| e.to_string()).unwrap_or_else(|| "-".into()),
            format!("{} ms", self.elapsed_ms),
            self.last_body.as_deref().map(excerpt).unwrap_or_else(|| "-".into()),
        ]
    }
}

impl TableDisplay for CheckResult {
    fn headers() -> Vec<&'static str> {
        vec!["Check", "URL", "Result", "Attempts", "Expect", "Error"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.url.clone(),
            if self.success { "pass".into() } else { "FAIL".into() },
            self.report
                .as_ref()
                .map(|r| format!("{}/{}", r.attempts, r.max_attempts))
                .unwrap_or_else(|| "-".into()),
            self.validator.clone(),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

/// Scenario listing row
#[derive(Serialize, Clone)]
pub struct ScenarioSummary {
    pub name: String,
    pub tags: String,
    pub terraform: String,
    pub checks: usize,
    pub description: String,
}

impl From<&Scenario> for ScenarioSummary {
    fn from(scenario: &Scenario) -> Self {
        Self {
            name: scenario.name.clone(),
            tags: scenario.tags.join(","),
            terraform: scenario
                .terraform_dir()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "-".into()),
            checks: scenario.checks.len(),
            description: scenario.description.clone(),
        }
    }
}

impl TableDisplay for ScenarioSummary {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Tags", "Terraform", "Checks", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.tags.clone(),
            self.terraform.clone(),
            self.checks.to_string(),
            self.description.clone(),
        ]
    }
}

fn excerpt(body: &str) -> String {
    let flat: String = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > BODY_EXCERPT_LENGTH {
        let cut: String = flat.chars().take(BODY_EXCERPT_LENGTH).collect();
        format!("{cut}…")
    } else {
        flat
    }
}

/// Print a single item
pub fn print_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            table.add_row(item.row());

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(item).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(item).unwrap_or_default());
        }
        OutputFormat::Plain => {
            let row = item.row();
            for (header, value) in T::headers().iter().zip(row.iter()) {
                println!("{}: {}", header, value);
            }
        }
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(items).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}
