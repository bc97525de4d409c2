//! CLI integration tests

use std::path::Path;
use std::process::{Command, Output};

use mockito::Matcher;
use serde_json::Value;
use tempfile::TempDir;

const USAGE_CSV: &str = "\
ResourceId,ProductName,UsageAmount,UnblendedCost,AvailabilityZone,instanceType,UsageStartDate
i-idle,Amazon EC2,1.0,0.6,ap-south-1a,unknown,2025-06-22T00:00:00Z
vol-1,Amazon EBS,50.0,0.4,ap-south-1b,unknown,2025-06-22T00:00:00Z
vol-1,Amazon EBS,50.0,0.4,ap-south-1b,unknown,2025-06-22T01:00:00Z
i-busy,Amazon EC2,90.0,0.1,ap-south-1a,unknown,2025-06-22T00:00:00Z
i-busy,Amazon EC2,90.0,0.1,ap-south-1a,unknown,2025-06-22T01:00:00Z
i-bad,Amazon EC2,lots,0.1,ap-south-1a,unknown,2025-06-22T01:00:00Z
";

const RECOMMENDATIONS_JSON: &str = r#"[{
    "id": "rec-20250622000000-1a2b3c4d",
    "resource_id": "i-idle",
    "service_type": "Amazon EC2",
    "instance_type": "unknown",
    "availability_zone": "ap-south-1a",
    "current_cost": 0.6,
    "total_usage": 1.0,
    "wastage_score": 75,
    "priority": "High",
    "estimated_savings": 0.45,
    "estimated_monthly_savings": 13.5,
    "reasons": [
        "Critical: very low compute utilization detected",
        "Single usage record with material cost - resource is likely idle"
    ],
    "confidence_score": 7.5,
    "status": "Active",
    "created_at": "2025-06-22T00:00:00Z"
}]"#;

const FORECAST_JSON: &str = r#"{
    "prediction_date": "2025-06-22",
    "ensemble_prediction": 2.28,
    "confidence_score": 73.36,
    "trend": "decreasing",
    "recommendation": "monitor",
    "forecast_range": {"min": 2.01, "max": 2.74},
    "weights": {"statistical": 0.374, "ml": 0.626},
    "model_agreement": 0.73,
    "signals": {"high_cost_risk": false, "volatility_concern": true},
    "created_at": "2025-06-22T00:00:00Z"
}"#;

/// Command for the built binary, isolated from the user's config and environment
fn cwd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cwd"));
    cmd.env("NO_COLOR", "1")
        .env("CWD_CONFIG", home.join("config.json"))
        .env_remove("CWD_API_URL")
        .env_remove("RUST_LOG");
    cmd
}

fn run(cmd: &mut Command) -> (Output, String, String) {
    let output = cmd.output().expect("Failed to execute cwd");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (output, stdout, stderr)
}

fn write_model_results(dir: &Path) -> (String, String) {
    let statistical = dir.join("arima_results_20250622_000000.json");
    let ml = dir.join("prophet_results_20250622_000000.json");
    std::fs::write(
        &statistical,
        r#"{"model_name": "arima", "forecast_summary": {"avg_predicted_cost": 2.74}, "performance_metrics": {"mape": 31.0}}"#,
    )
    .unwrap();
    std::fs::write(
        &ml,
        r#"{"model_name": "prophet", "forecast_summary": {"avg_predicted_cost": 2.01}, "performance_metrics": {"mape": 18.5}}"#,
    )
    .unwrap();
    (
        statistical.display().to_string(),
        ml.display().to_string(),
    )
}

#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    let (output, stdout, _) = run(cwd(home.path()).arg("--help"));

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Cloud Waste Detector"), "Should show app name");
    assert!(stdout.contains("score"), "Should show score command");
    assert!(stdout.contains("forecast"), "Should show forecast command");
    assert!(stdout.contains("get"), "Should show get command");
    assert!(stdout.contains("status"), "Should show status command");
}

#[test]
fn test_cli_version() {
    let home = TempDir::new().unwrap();
    let (output, stdout, _) = run(cwd(home.path()).arg("--version"));

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("cwd"), "Should show binary name");
}

#[test]
fn test_invalid_command() {
    let home = TempDir::new().unwrap();
    let (output, _, _) = run(cwd(home.path()).arg("invalid-command"));

    assert!(!output.status.success(), "Invalid command should fail");
}

#[test]
fn test_score_table_output() {
    let home = TempDir::new().unwrap();
    let csv = home.path().join("usage.csv");
    std::fs::write(&csv, USAGE_CSV).unwrap();

    let (output, stdout, _) = run(cwd(home.path()).arg("score").arg(&csv));

    assert!(output.status.success(), "score should succeed: {stdout}");
    assert!(stdout.contains("i-idle"));
    assert!(stdout.contains("vol-1"));
    assert!(!stdout.contains("i-busy"), "Busy instance is not waste");
    assert!(stdout.contains("Skipped 1 malformed row"));
    assert!(stdout.contains("Total: 2 recommendations (1 high, 0 medium, 1 low)"));
}

#[test]
fn test_score_json_output_with_limit() {
    let home = TempDir::new().unwrap();
    let csv = home.path().join("usage.csv");
    std::fs::write(&csv, USAGE_CSV).unwrap();

    let (output, stdout, _) = run(cwd(home.path())
        .args(["--format", "json", "score"])
        .arg(&csv)
        .args(["--limit", "1"]));

    assert!(output.status.success());
    let report: Value = serde_json::from_str(&stdout).expect("score JSON output");
    assert_eq!(report["rows"], 6);
    assert_eq!(report["skipped"], 1);
    assert_eq!(report["resources"], 3);
    assert_eq!(report["summary"]["total"], 2);

    let recs = report["recommendations"].as_array().unwrap();
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0]["resource_id"], "i-idle");
    assert_eq!(recs[0]["wastage_score"], 75);
    assert_eq!(recs[0]["priority"], "High");
}

#[test]
fn test_score_missing_file_fails() {
    let home = TempDir::new().unwrap();
    let (output, _, stderr) = run(cwd(home.path()).args(["score", "does-not-exist.csv"]));

    assert!(!output.status.success());
    assert!(stderr.contains("Failed to read usage file"));
}

#[test]
fn test_forecast_from_files() {
    let home = TempDir::new().unwrap();
    let (statistical, ml) = write_model_results(home.path());

    let (output, stdout, _) = run(cwd(home.path()).args([
        "forecast",
        "--statistical",
        &statistical,
        "--ml",
        &ml,
        "-f",
        "json",
    ]));

    assert!(output.status.success(), "forecast should succeed");
    let forecast: Value = serde_json::from_str(&stdout).expect("forecast JSON output");
    let prediction = forecast["ensemble_prediction"].as_f64().unwrap();
    assert!((prediction - 2.28).abs() < 0.01);
    assert_eq!(forecast["trend"], "decreasing");
    assert_eq!(forecast["recommendation"], "monitor");
}

#[test]
fn test_forecast_baseline_override() {
    let home = TempDir::new().unwrap();
    let (statistical, ml) = write_model_results(home.path());

    let (output, stdout, _) = run(cwd(home.path()).args([
        "-f",
        "json",
        "forecast",
        "--statistical",
        &statistical,
        "--ml",
        &ml,
        "--baseline",
        "2.0",
    ]));

    assert!(output.status.success());
    let forecast: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(forecast["trend"], "stable");
}

#[test]
fn test_forecast_from_directory_table() {
    let home = TempDir::new().unwrap();
    write_model_results(home.path());

    let (output, stdout, _) = run(cwd(home.path())
        .args(["forecast", "--dir"])
        .arg(home.path()));

    assert!(output.status.success());
    assert!(stdout.contains("Ensemble Cost Forecast"));
    assert!(stdout.contains("$2.01 - $2.74"));
    assert!(stdout.contains("monitor"));
}

#[test]
fn test_forecast_missing_ml_results_fails() {
    let home = TempDir::new().unwrap();
    let (statistical, _) = write_model_results(home.path());

    let (output, _, stderr) = run(cwd(home.path()).args(["forecast", "--statistical", &statistical]));

    assert!(!output.status.success());
    assert!(stderr.contains("machine_learning"));
}

#[test]
fn test_get_recommendations_passes_filters() {
    let home = TempDir::new().unwrap();
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/api/v1/recommendations")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("priority".into(), "high".into()),
            Matcher::UrlEncoded("status".into(), "active".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(RECOMMENDATIONS_JSON)
        .create();

    let (output, stdout, _) = run(cwd(home.path()).args([
        "--api-url",
        &server.url(),
        "get",
        "recommendations",
        "--priority",
        "high",
        "--status",
        "active",
    ]));

    assert!(output.status.success());
    assert!(stdout.contains("i-idle"));
    assert!(stdout.contains("$13.50"));
    assert!(stdout.contains("Total: 1 recommendations"));
    mock.assert();
}

#[test]
fn test_get_recommendations_uses_config_file() {
    let home = TempDir::new().unwrap();
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/api/v1/recommendations")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(RECOMMENDATIONS_JSON)
        .create();

    std::fs::write(
        home.path().join("config.json"),
        format!(
            r#"{{"api_url": "{}", "default_format": "json"}}"#,
            server.url()
        ),
    )
    .unwrap();

    let (output, stdout, _) = run(cwd(home.path()).args(["get", "recommendations"]));

    assert!(output.status.success());
    let recs: Value = serde_json::from_str(&stdout).expect("JSON from config default");
    assert_eq!(recs[0]["resource_id"], "i-idle");
}

#[test]
fn test_get_prediction() {
    let home = TempDir::new().unwrap();
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/api/v1/predictions/latest")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(FORECAST_JSON)
        .create();

    let (output, stdout, _) = run(cwd(home.path())
        .env("CWD_API_URL", server.url())
        .args(["get", "prediction"]));

    assert!(output.status.success());
    assert!(stdout.contains("$2.28 per day"));
    assert!(stdout.contains("73.4%"));
    assert!(stdout.contains("Models disagree"));
}

#[test]
fn test_get_prediction_run_posts() {
    let home = TempDir::new().unwrap();
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/api/v1/predictions/run")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(
            r#"{{"forecast": {}, "alerts": {{"sent": 0, "suppressed": 0, "failures": []}}}}"#,
            FORECAST_JSON
        ))
        .create();

    let (output, stdout, _) = run(cwd(home.path()).args([
        "--api-url",
        &server.url(),
        "-f",
        "json",
        "get",
        "prediction",
        "--run",
    ]));

    assert!(output.status.success());
    let forecast: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(forecast["prediction_date"], "2025-06-22");
    mock.assert();
}

#[test]
fn test_get_prediction_not_found() {
    let home = TempDir::new().unwrap();
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/api/v1/predictions/latest")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"kind": "not_found", "message": "no ensemble forecast has been generated yet"}"#)
        .create();

    let (output, _, stderr) = run(cwd(home.path()).args([
        "--api-url",
        &server.url(),
        "get",
        "prediction",
    ]));

    assert!(!output.status.success());
    assert!(stderr.contains("not_found"));
}

#[test]
fn test_status_shows_components() {
    let home = TempDir::new().unwrap();
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/healthz")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"status": "degraded", "components": {
                "notifier": {"status": "degraded", "message": "webhook timed out", "checked_at": "2025-06-22T00:00:00Z"},
                "scorer": {"status": "healthy", "checked_at": "2025-06-22T00:00:00Z"}
            }}"#,
        )
        .create();

    let (output, stdout, _) = run(cwd(home.path()).args(["--api-url", &server.url(), "status"]));

    assert!(output.status.success());
    assert!(stdout.contains("degraded"));
    assert!(stdout.contains("webhook timed out"));
    assert!(stdout.contains("Agent is operational"));
}

#[test]
fn test_unreachable_agent_fails() {
    let home = TempDir::new().unwrap();
    let (output, _, stderr) = run(cwd(home.path()).args([
        "--api-url",
        "http://127.0.0.1:1",
        "get",
        "recommendations",
    ]));

    assert!(!output.status.success());
    assert!(stderr.contains("Failed to send request"));
}

const SPIKE_CSV: &str = "\
ResourceId,ProductName,UsageAmount,UnblendedCost,UsageStartDate
i-spiky,Amazon EC2,1.0,0.2,2025-06-18T00:00:00Z
i-spiky,Amazon EC2,1.0,0.2,2025-06-19T00:00:00Z
i-spiky,Amazon EC2,1.0,0.2,2025-06-20T00:00:00Z
i-spiky,Amazon EC2,1.0,0.2,2025-06-21T00:00:00Z
i-spiky,Amazon EC2,1.0,3.0,2025-06-22T00:00:00Z
";

#[test]
fn test_analyze_json_reports_spike_and_trend() {
    let home = TempDir::new().unwrap();
    let csv = home.path().join("usage.csv");
    std::fs::write(&csv, SPIKE_CSV).unwrap();

    let (output, stdout, _) = run(cwd(home.path()).args(["-f", "json", "analyze"]).arg(&csv));

    assert!(output.status.success());
    let report: Value = serde_json::from_str(&stdout).expect("analyze JSON output");
    assert_eq!(report["rows"], 5);
    assert_eq!(report["trend"]["trend"], "increasing");
    assert_eq!(report["trend"]["days_analyzed"], 5);

    let anomalies = report["anomalies"]["anomalies"].as_array().unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0]["resource_id"], "i-spiky");
    assert_eq!(anomalies[0]["severity"], "Medium");
    assert_eq!(report["anomalies"]["medium_severity"], 1);
}

#[test]
fn test_analyze_table_without_anomalies() {
    let home = TempDir::new().unwrap();
    let csv = home.path().join("usage.csv");
    std::fs::write(&csv, USAGE_CSV).unwrap();

    let (output, stdout, _) = run(cwd(home.path()).arg("analyze").arg(&csv));

    assert!(output.status.success());
    assert!(stdout.contains("Daily Spend"));
    assert!(stdout.contains("Trend:   insufficient_data"));
    assert!(stdout.contains("No cost anomalies detected"));
}

#[test]
fn test_remediate_prints_high_priority_blocks() {
    let home = TempDir::new().unwrap();
    let csv = home.path().join("usage.csv");
    std::fs::write(&csv, USAGE_CSV).unwrap();

    let (output, stdout, _) = run(cwd(home.path()).arg("remediate").arg(&csv));

    assert!(output.status.success());
    assert!(stdout.contains("terraform import aws_instance.i_idle i-idle"));
    assert!(stdout.contains("region = \"ap-south-1\""));
    assert!(!stdout.contains("vol_1"), "Low priority volume is excluded by default");
}

#[test]
fn test_remediate_writes_plan_into_directory() {
    let home = TempDir::new().unwrap();
    let csv = home.path().join("usage.csv");
    std::fs::write(&csv, USAGE_CSV).unwrap();
    let plans = home.path().join("plans");
    std::fs::create_dir(&plans).unwrap();

    let (output, stdout, _) = run(cwd(home.path())
        .arg("remediate")
        .arg(&csv)
        .args(["--min-priority", "low", "-o"])
        .arg(&plans));

    assert!(output.status.success());
    assert!(stdout.contains("Wrote 2 block(s), 2 actionable"));

    let written: Vec<_> = std::fs::read_dir(&plans)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(written.len(), 1);
    let name = written[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("terraform-delete-") && name.ends_with(".tf"));

    let content = std::fs::read_to_string(&written[0]).unwrap();
    assert!(content.contains("resource \"aws_ebs_volume\" \"vol_1\""));
    assert!(content.contains("resource \"aws_instance\" \"i_idle\""));
}

#[test]
fn test_remediate_rejects_unknown_priority() {
    let home = TempDir::new().unwrap();
    let csv = home.path().join("usage.csv");
    std::fs::write(&csv, USAGE_CSV).unwrap();

    let (output, _, stderr) = run(cwd(home.path())
        .arg("remediate")
        .arg(&csv)
        .args(["--min-priority", "urgent"]));

    assert!(!output.status.success());
    assert!(stderr.contains("unknown priority"));
}
