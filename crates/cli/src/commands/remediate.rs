//! Terraform remediation plans from a billing export

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use waste_lib::remediation::build_plan;
use waste_lib::{Priority, RemediationConfig};

use super::score::{score_usage, ScoredFile};
use crate::output::{print_info, print_json, print_success, OutputFormat};

/// Score a usage CSV and render Terraform blocks for its recommendations
///
/// With `output` the plan is written to that file, or into that directory
/// under its generated name; otherwise it goes to stdout.
pub fn remediate_file(
    path: &Path,
    primary_zone: Option<String>,
    min_priority: &str,
    region: Option<String>,
    output: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let mut config = RemediationConfig {
        min_priority: min_priority
            .parse::<Priority>()
            .map_err(anyhow::Error::msg)?,
        ..Default::default()
    };
    if let Some(region) = region {
        config.default_region = region;
    }

    let ScoredFile { ranked, .. } = score_usage(path, primary_zone)?;
    let plan = build_plan(&ranked, &config, Utc::now());

    if let Some(target) = output {
        let target = if target.is_dir() {
            target.join(&plan.file_name)
        } else {
            target
        };
        std::fs::write(&target, &plan.content)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        print_success(&format!(
            "Wrote {} block(s), {} actionable, to {}",
            plan.blocks.len(),
            plan.actionable(),
            target.display()
        ));
        return Ok(());
    }

    match format {
        OutputFormat::Json => print_json(&plan)?,
        OutputFormat::Table => {
            if plan.is_empty() {
                print_info(&format!(
                    "No {} or higher priority recommendations to remediate",
                    config.min_priority
                ));
            } else {
                print!("{}", plan.content);
            }
        }
    }

    Ok(())
}
