//! Cost spike and spend trend analysis of a billing export

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;
use waste_lib::usage::{
    analyze_cost_trend, read_usage_file, AnomalyReport, AnomalySeverity, CostAnomalyDetector,
    CostTrend, CostTrendReport,
};

use crate::output::{format_currency, print_info, print_json, print_warning, OutputFormat};

#[derive(Tabled)]
struct DayRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Cost")]
    cost: String,
}

#[derive(Tabled)]
struct AnomalyRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Average")]
    average: String,
    #[tabled(rename = "Peak")]
    peak: String,
    #[tabled(rename = "Records")]
    records: usize,
}

/// JSON shape of an analysis run
#[derive(Debug, Serialize)]
struct AnalysisReport<'a> {
    rows: usize,
    skipped: usize,
    trend: &'a CostTrendReport,
    anomalies: &'a AnomalyReport,
}

fn color_severity(severity: AnomalySeverity) -> String {
    match severity {
        AnomalySeverity::High => severity.to_string().red().bold().to_string(),
        AnomalySeverity::Medium => severity.to_string().yellow().to_string(),
    }
}

fn color_trend(trend: CostTrend) -> String {
    match trend {
        CostTrend::Increasing => trend.to_string().red().to_string(),
        CostTrend::Decreasing => trend.to_string().green().to_string(),
        CostTrend::Stable | CostTrend::InsufficientData => trend.to_string(),
    }
}

/// Report daily spend and per-resource cost spikes in a usage CSV
pub fn analyze_file(path: &Path, spike_factor: Option<f64>, format: OutputFormat) -> Result<()> {
    let report = read_usage_file(path)
        .with_context(|| format!("Failed to read usage file {}", path.display()))?;

    let mut detector = CostAnomalyDetector::default();
    if let Some(factor) = spike_factor {
        detector.spike_factor = factor;
    }

    let trend = analyze_cost_trend(&report.records);
    let anomalies = detector.detect(&report.records);

    match format {
        OutputFormat::Json => print_json(&AnalysisReport {
            rows: report.total_rows(),
            skipped: report.skipped.len(),
            trend: &trend,
            anomalies: &anomalies,
        })?,
        OutputFormat::Table => {
            if !report.skipped.is_empty() {
                print_warning(&format!(
                    "Skipped {} malformed row(s) of {}",
                    report.skipped.len(),
                    report.total_rows()
                ));
            }

            println!("{}", "Daily Spend".bold());
            let days: Vec<DayRow> = trend
                .daily_costs
                .iter()
                .map(|(date, cost)| DayRow {
                    date: date.to_string(),
                    cost: format_currency(*cost),
                })
                .collect();
            if !days.is_empty() {
                let table = tabled::Table::new(days)
                    .with(tabled::settings::Style::rounded())
                    .to_string();
                println!("{}", table);
            }
            println!(
                "Average: {} per day (min {}, max {})",
                format_currency(trend.average_daily_cost),
                format_currency(trend.min_daily_cost),
                format_currency(trend.max_daily_cost)
            );
            println!("Trend:   {}", color_trend(trend.trend));
            println!();

            if anomalies.anomalies.is_empty() {
                print_info("No cost anomalies detected");
                return Ok(());
            }

            println!("{}", "Cost Anomalies".bold());
            let rows: Vec<AnomalyRow> = anomalies
                .anomalies
                .iter()
                .map(|a| AnomalyRow {
                    resource: a.resource_id.clone(),
                    service: a.service_type.clone(),
                    severity: color_severity(a.severity),
                    average: format_currency(a.average_cost),
                    peak: format_currency(a.spike_cost),
                    records: a.record_count,
                })
                .collect();
            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!(
                "\nTotal: {} anomalies ({} high, {} medium)",
                anomalies.total(),
                anomalies.high_severity,
                anomalies.medium_severity
            );
        }
    }

    Ok(())
}
