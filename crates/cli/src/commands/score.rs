//! Offline scoring of a billing export

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;
use tracing::debug;
use waste_lib::scoring::{rank_recommendations, RankingSummary, ScoringConfig, WasteScorer};
use waste_lib::usage::{aggregate, read_usage_file, IngestReport};
use waste_lib::WasteRecommendation;

use crate::output::{
    color_confidence, color_priority, format_currency, print_info, print_json, print_warning,
    summarize_reasons, OutputFormat,
};

/// Row for the recommendations table
#[derive(Tabled)]
struct ScoreRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Score")]
    score: u32,
    #[tabled(rename = "Cost")]
    cost: String,
    #[tabled(rename = "Monthly Savings")]
    monthly_savings: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Reasons")]
    reasons: String,
}

/// JSON shape of a local scoring run
#[derive(Debug, Serialize)]
struct ScoreReport<'a> {
    rows: usize,
    skipped: usize,
    resources: usize,
    summary: &'a RankingSummary,
    recommendations: &'a [WasteRecommendation],
}

/// A usage file read, aggregated and ranked
pub struct ScoredFile {
    pub report: IngestReport,
    pub resources: usize,
    pub ranked: Vec<WasteRecommendation>,
}

/// Read a usage CSV and rank its recommendations
pub fn score_usage(path: &Path, primary_zone: Option<String>) -> Result<ScoredFile> {
    let report = read_usage_file(path)
        .with_context(|| format!("Failed to read usage file {}", path.display()))?;

    let mut config = ScoringConfig::default();
    if let Some(zone) = primary_zone {
        config.primary_zone = zone;
    }
    debug!(primary_zone = %config.primary_zone, "Scoring with configuration");

    let aggregates = aggregate(&report.records);
    let scorer = WasteScorer::with_config(config);
    let ranked = rank_recommendations(scorer.score_all(&aggregates));

    Ok(ScoredFile {
        resources: aggregates.len(),
        report,
        ranked,
    })
}

/// Score a usage CSV and print the ranked recommendations
pub fn score_file(
    path: &Path,
    primary_zone: Option<String>,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let ScoredFile {
        report,
        resources,
        ranked,
    } = score_usage(path, primary_zone)?;
    let summary = RankingSummary::from_recommendations(&ranked);

    let shown = match limit {
        Some(n) => &ranked[..n.min(ranked.len())],
        None => &ranked[..],
    };

    match format {
        OutputFormat::Json => print_json(&ScoreReport {
            rows: report.total_rows(),
            skipped: report.skipped.len(),
            resources,
            summary: &summary,
            recommendations: shown,
        })?,
        OutputFormat::Table => {
            if !report.skipped.is_empty() {
                print_warning(&format!(
                    "Skipped {} malformed row(s) of {}",
                    report.skipped.len(),
                    report.total_rows()
                ));
            }

            if shown.is_empty() {
                print_info(&format!(
                    "No waste found across {} resource(s)",
                    resources
                ));
                return Ok(());
            }

            let rows: Vec<ScoreRow> = shown
                .iter()
                .enumerate()
                .map(|(i, r)| ScoreRow {
                    rank: i + 1,
                    resource: r.resource_id.clone(),
                    service: r.service_type.clone(),
                    priority: color_priority(r.priority),
                    score: r.wastage_score,
                    cost: format_currency(r.current_cost),
                    monthly_savings: format_currency(r.estimated_monthly_savings),
                    confidence: color_confidence(r.confidence_score),
                    reasons: summarize_reasons(&r.reasons),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);

            println!(
                "\nTotal: {} recommendations ({} high, {} medium, {} low)",
                summary.total, summary.high, summary.medium, summary.low
            );
            println!(
                "Potential savings: {} per month",
                format_currency(summary.total_monthly_savings).green().bold()
            );
        }
    }

    Ok(())
}
