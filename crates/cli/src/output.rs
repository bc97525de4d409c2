//! Output formatting utilities

use std::str::FromStr;

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use waste_lib::{ComponentStatus, ForecastAction, Priority};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a dollar amount
pub fn format_currency(amount: f64) -> String {
    format!("${:.2}", amount)
}

/// Color a recommendation priority
pub fn color_priority(priority: Priority) -> String {
    let label = priority.to_string();
    match priority {
        Priority::High => label.red().bold().to_string(),
        Priority::Medium => label.yellow().to_string(),
        Priority::Low => label.green().to_string(),
    }
}

/// Color a recommendation confidence on its 0-10 scale
pub fn color_confidence(confidence: f64) -> String {
    let formatted = format!("{:.1}", confidence);
    if confidence >= 7.0 {
        formatted.green().to_string()
    } else if confidence >= 4.0 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

/// Color an ensemble confidence percentage
pub fn color_percent(confidence: f64, threshold: f64) -> String {
    let formatted = format!("{:.1}%", confidence);
    if confidence >= threshold {
        formatted.green().to_string()
    } else {
        formatted.red().to_string()
    }
}

/// Color a forecast follow-up action
pub fn color_action(action: ForecastAction) -> String {
    let label = action.to_string();
    match action {
        ForecastAction::Monitor => label.green().to_string(),
        ForecastAction::Investigate => label.yellow().bold().to_string(),
    }
}

/// Color a health status
pub fn color_status(status: ComponentStatus) -> String {
    match status {
        ComponentStatus::Healthy => "healthy".green().to_string(),
        ComponentStatus::Degraded => "degraded".yellow().to_string(),
        ComponentStatus::Unhealthy => "unhealthy".red().to_string(),
    }
}

/// Shorten long reason lists for a table cell
pub fn summarize_reasons(reasons: &[String]) -> String {
    match reasons {
        [] => "-".to_string(),
        [only] => only.clone(),
        [first, rest @ ..] => format!("{} (+{} more)", first, rest.len()),
    }
}
