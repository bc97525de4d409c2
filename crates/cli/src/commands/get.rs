//! Queries against a running waste agent

use anyhow::Result;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tabled::Tabled;
use waste_lib::{EnsembleForecast, WasteRecommendation};

use crate::client::ApiClient;
use crate::commands::forecast::print_forecast;
use crate::output::{
    color_confidence, color_priority, color_status, format_currency, print_json, print_success,
    print_warning, summarize_reasons, OutputFormat,
};

/// Confidence below which the agent suggests investigating; only used for coloring
const DISPLAY_MONITOR_CONFIDENCE: f64 = 70.0;

/// Row for recommendations table
#[derive(Tabled)]
struct RecommendationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Score")]
    score: u32,
    #[tabled(rename = "Monthly Savings")]
    monthly_savings: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Reasons")]
    reasons: String,
}

/// Row for the component health table
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Failures")]
    failures: u32,
    #[tabled(rename = "Checked")]
    checked_at: String,
}

/// Response of `POST /api/v1/predictions/run`; alert details are not shown
#[derive(Debug, Deserialize, Serialize)]
struct RunResponse {
    forecast: EnsembleForecast,
}

/// List stored recommendations with optional filters
pub async fn get_recommendations(
    client: &ApiClient,
    priority: Option<String>,
    status: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let recommendations: Vec<WasteRecommendation> = client
        .get(
            "api/v1/recommendations",
            &[
                ("priority", priority.as_deref()),
                ("status", status.as_deref()),
            ],
        )
        .await?;

    match format {
        OutputFormat::Json => print_json(&recommendations)?,
        OutputFormat::Table => {
            if recommendations.is_empty() {
                print_warning("No recommendations found");
                return Ok(());
            }

            let rows: Vec<RecommendationRow> = recommendations
                .iter()
                .map(|r| RecommendationRow {
                    id: r.id.clone(),
                    resource: r.resource_id.clone(),
                    priority: color_priority(r.priority),
                    score: r.wastage_score,
                    monthly_savings: format_currency(r.estimated_monthly_savings),
                    confidence: color_confidence(r.confidence_score),
                    status: r.status.to_string(),
                    reasons: summarize_reasons(&r.reasons),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!("\nTotal: {} recommendations", recommendations.len());
        }
    }

    Ok(())
}

/// Show the latest ensemble forecast, optionally asking the agent to run one first
pub async fn get_prediction(client: &ApiClient, run: bool, format: OutputFormat) -> Result<()> {
    let forecast = if run {
        let response: RunResponse = client
            .post("api/v1/predictions/run", &serde_json::json!({}))
            .await?;
        response.forecast
    } else {
        client.get("api/v1/predictions/latest", &[]).await?
    };

    match format {
        OutputFormat::Json => print_json(&forecast)?,
        OutputFormat::Table => print_forecast(&forecast, DISPLAY_MONITOR_CONFIDENCE),
    }

    Ok(())
}

/// Show agent health
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;

    match format {
        OutputFormat::Json => print_json(&health)?,
        OutputFormat::Table => {
            println!("{}", "Agent Status".bold());
            println!("{}", "=".repeat(40));
            println!("Endpoint: {}", client.base_url().as_str().cyan());
            println!("Overall:  {}", color_status(health.status));
            println!();

            let rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, component)| ComponentRow {
                    name: name.clone(),
                    status: color_status(component.status),
                    message: component.message.clone().unwrap_or_else(|| "-".to_string()),
                    failures: component.consecutive_failures,
                    checked_at: component.checked_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                })
                .collect();

            if rows.is_empty() {
                print_warning("No components registered");
            } else {
                let table = tabled::Table::new(rows)
                    .with(tabled::settings::Style::rounded())
                    .to_string();
                println!("{}", table);
            }

            if health.status.is_operational() {
                print_success("Agent is operational");
            } else {
                print_warning("Agent is unhealthy");
            }
        }
    }

    Ok(())
}
