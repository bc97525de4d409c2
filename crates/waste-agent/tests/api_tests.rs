//! Integration tests for the agent API endpoints

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use waste_agent::api::{create_router, AppState};
use waste_lib::{
    forecast::DirectoryForecastSource,
    health::{components, HealthRegistry},
    WastePipeline,
};

async fn setup_test_app(forecast_dir: &std::path::Path) -> (Router, AppState) {
    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;

    let pipeline = WastePipeline::default().with_health(health_registry.clone());
    let state = AppState::new(
        health_registry,
        pipeline,
        Arc::new(DirectoryForecastSource::new(forecast_dir)),
    );
    let router = create_router(state.clone());

    (router, state)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn usage_batch() -> Value {
    json!([
        {"resource_id": "i-idle", "service_type": "Amazon EC2", "usage_amount": 1.0, "cost": 0.6,
         "timestamp": "2025-06-22T00:00:00Z"},
        {"resource_id": "vol-1", "service_type": "Amazon EBS", "usage_amount": 50.0, "cost": 0.4,
         "availability_zone": "ap-south-1b", "timestamp": "2025-06-22T00:00:00Z"},
        {"resource_id": "vol-1", "service_type": "Amazon EBS", "usage_amount": 50.0, "cost": 0.4,
         "availability_zone": "ap-south-1b", "timestamp": "2025-06-22T01:00:00Z"},
        {"resource_id": "i-busy", "service_type": "Amazon EC2", "usage_amount": 90.0, "cost": 0.1,
         "timestamp": "2025-06-22T00:00:00Z"},
        {"resource_id": "i-busy", "service_type": "Amazon EC2", "usage_amount": 90.0, "cost": 0.1,
         "timestamp": "2025-06-22T01:00:00Z"}
    ])
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(dir.path()).await;

    let (status, health) = send(app, get("/healthz")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert!(health["components"][components::NOTIFIER].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let dir = TempDir::new().unwrap();
    let (app, state) = setup_test_app(dir.path()).await;

    state
        .health_registry
        .set_degraded(components::NOTIFIER, "webhook timed out")
        .await;

    let (status, health) = send(app, get("/healthz")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let dir = TempDir::new().unwrap();
    let (app, state) = setup_test_app(dir.path()).await;

    state
        .health_registry
        .set_unhealthy(components::SCORER, "crashed")
        .await;

    let (status, health) = send(app, get("/healthz")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_follows_ready_flag() {
    let dir = TempDir::new().unwrap();
    let (app, state) = setup_test_app(dir.path()).await;

    let (status, readiness) = send(app.clone(), get("/readyz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);

    state.health_registry.set_ready(true).await;

    let (status, readiness) = send(app, get("/readyz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_detector_metrics() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(dir.path()).await;

    // Produce at least one labelled sample
    let _ = send(
        app.clone(),
        post_json("/api/v1/recommendations/score", usage_batch()),
    )
    .await;

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("cwd_scoring_latency_seconds"));
    assert!(text.contains("cwd_recommendations_generated_total"));
}

#[tokio::test]
async fn test_score_ranks_and_stores_recommendations() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(dir.path()).await;

    let (status, outcome) = send(
        app.clone(),
        post_json("/api/v1/recommendations/score", usage_batch()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["resources"], 3);
    let recs = outcome["recommendations"].as_array().unwrap();
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0]["resource_id"], "i-idle");
    assert_eq!(recs[0]["priority"], "High");
    assert_eq!(recs[1]["resource_id"], "vol-1");
    assert_eq!(outcome["summary"]["high"], 1);
    assert_eq!(outcome["alerts"]["sent"], 1);

    let (status, listed) = send(app.clone(), get("/api/v1/recommendations")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let id = recs[0]["id"].as_str().unwrap();
    let (status, single) = send(app, get(&format!("/api/v1/recommendations/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(single["resource_id"], "i-idle");
}

#[tokio::test]
async fn test_list_recommendations_filters() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(dir.path()).await;

    send(
        app.clone(),
        post_json("/api/v1/recommendations/score", usage_batch()),
    )
    .await;

    let (status, high) = send(app.clone(), get("/api/v1/recommendations?priority=high")).await;
    assert_eq!(status, StatusCode::OK);
    let high = high.as_array().unwrap();
    assert_eq!(high.len(), 1);
    assert_eq!(high[0]["resource_id"], "i-idle");

    let (_, resolved) = send(app.clone(), get("/api/v1/recommendations?status=resolved")).await;
    assert!(resolved.as_array().unwrap().is_empty());

    let (status, error) = send(app, get("/api/v1/recommendations?priority=urgent")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["kind"], "bad_request");
}

#[tokio::test]
async fn test_score_skips_bad_record_and_keeps_batch() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(dir.path()).await;

    let batch = json!([
        {"resource_id": "i-idle", "service_type": "Amazon EC2", "usage_amount": 1.0, "cost": 0.6},
        {"resource_id": "i-bad", "service_type": "Amazon EC2", "usage_amount": "abc", "cost": 0.1}
    ]);
    let (status, outcome) = send(app, post_json("/api/v1/recommendations/score", batch)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["skipped"], 1);
    assert_eq!(outcome["resources"], 1);
    let recs = outcome["recommendations"].as_array().unwrap();
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0]["resource_id"], "i-idle");
}

#[tokio::test]
async fn test_score_non_array_body_is_typed_error() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(dir.path()).await;

    let (status, error) = send(
        app,
        post_json("/api/v1/recommendations/score", json!({"resource_id": "i-1"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error["kind"], "invalid_body");
    assert!(error["message"].as_str().unwrap().contains("deserialize"));
}

#[tokio::test]
async fn test_remediation_plan_from_stored_recommendations() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(dir.path()).await;

    let (_, empty) = send(app.clone(), get("/api/v1/remediation")).await;
    assert!(empty["blocks"].as_array().unwrap().is_empty());

    send(
        app.clone(),
        post_json("/api/v1/recommendations/score", usage_batch()),
    )
    .await;

    let (status, plan) = send(app.clone(), get("/api/v1/remediation")).await;
    assert_eq!(status, StatusCode::OK);
    let blocks = plan["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0]["resource_id"], "i-idle");
    assert_eq!(blocks[0]["target"], "instance");
    assert!(plan["content"]
        .as_str()
        .unwrap()
        .contains("terraform import aws_instance.i_idle i-idle"));

    let (_, all) = send(app.clone(), get("/api/v1/remediation?min_priority=low")).await;
    assert_eq!(all["blocks"].as_array().unwrap().len(), 2);
    assert!(all["content"]
        .as_str()
        .unwrap()
        .contains("resource \"aws_ebs_volume\" \"vol_1\""));

    let (_, terminated) = send(
        app.clone(),
        get("/api/v1/remediation?min_priority=low&status=terminated"),
    )
    .await;
    assert!(terminated["blocks"].as_array().unwrap().is_empty());

    let (status, error) = send(app, get("/api/v1/remediation?min_priority=urgent")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["kind"], "bad_request");
}

#[tokio::test]
async fn test_unknown_recommendation_is_404() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(dir.path()).await;

    let (status, error) = send(app, get("/api/v1/recommendations/rec-missing")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["kind"], "not_found");
}

#[tokio::test]
async fn test_create_prediction_combines_summaries() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(dir.path()).await;

    let body = json!({
        "statistical": {"model_name": "arima", "avg_predicted_cost": 2.74, "mape": 31.0},
        "ml": {"model_name": "prophet", "avg_predicted_cost": 2.01, "mape": 18.5}
    });
    let (status, outcome) = send(app.clone(), post_json("/api/v1/predictions", body)).await;

    assert_eq!(status, StatusCode::OK);
    let forecast = &outcome["forecast"];
    let prediction = forecast["ensemble_prediction"].as_f64().unwrap();
    assert!((prediction - 2.28).abs() < 0.01);
    assert_eq!(forecast["trend"], "decreasing");
    assert_eq!(forecast["recommendation"], "monitor");

    let (status, latest) = send(app, get("/api/v1/predictions/latest")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["prediction_date"], forecast["prediction_date"]);
}

#[tokio::test]
async fn test_missing_summary_is_422() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(dir.path()).await;

    let body = json!({
        "statistical": {"model_name": "arima", "avg_predicted_cost": 2.74, "mape": 31.0}
    });
    let (status, error) = send(app, post_json("/api/v1/predictions", body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error["kind"], "missing_forecast_data");
    assert!(error["message"].as_str().unwrap().contains("machine_learning"));
}

#[tokio::test]
async fn test_latest_prediction_is_404_before_any_run() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(dir.path()).await;

    let (status, error) = send(app, get("/api/v1/predictions/latest")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["kind"], "not_found");
}

#[tokio::test]
async fn test_run_prediction_reads_forecast_directory() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("arima_results_20250601_000000.json"),
        r#"{"forecast_summary": {"avg_predicted_cost": 2.0}, "performance_metrics": {"mape": 10.0}}"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("prophet_results_20250601_000000.json"),
        r#"{"forecast_summary": {"avg_predicted_cost": 2.0}, "performance_metrics": {"mape": 20.0}}"#,
    )
    .unwrap();
    let (app, _state) = setup_test_app(dir.path()).await;

    let (status, outcome) = send(app, post_json("/api/v1/predictions/run", json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["forecast"]["confidence_score"], 100.0);
    assert_eq!(outcome["forecast"]["model_agreement"], 0.0);
}

#[tokio::test]
async fn test_run_prediction_without_results_degrades_source() {
    let dir = TempDir::new().unwrap();
    let (app, state) = setup_test_app(dir.path()).await;

    let (status, error) = send(app, post_json("/api/v1/predictions/run", json!({}))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error["kind"], "missing_forecast_data");

    let health = state.health_registry.health().await;
    assert_eq!(
        health.components[components::FORECAST_SOURCE].status,
        waste_lib::ComponentStatus::Degraded
    );
}
