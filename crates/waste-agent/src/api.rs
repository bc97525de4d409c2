//! HTTP API for scoring, forecasting, health checks and Prometheus metrics

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};
use waste_lib::{
    forecast::ForecastSource,
    health::{ComponentStatus, HealthRegistry},
    remediation::build_plan,
    EnsembleForecast, Error, ForecastOutcome, ForecastSummary, Priority, RecommendationStatus,
    RemediationConfig, RemediationPlan, ScoringOutcome, WastePipeline, WasteRecommendation,
};

/// Results kept between requests
#[derive(Debug, Default)]
pub struct ResultStore {
    /// Latest scoring pass, in rank order
    recommendations: Vec<WasteRecommendation>,
    /// One ensemble per prediction date; a rerun replaces that day
    predictions: BTreeMap<NaiveDate, EnsembleForecast>,
}

impl ResultStore {
    pub fn replace_recommendations(&mut self, recommendations: Vec<WasteRecommendation>) {
        self.recommendations = recommendations;
    }

    pub fn recommendations(&self) -> &[WasteRecommendation] {
        &self.recommendations
    }

    pub fn recommendation(&self, id: &str) -> Option<&WasteRecommendation> {
        self.recommendations.iter().find(|r| r.id == id)
    }

    pub fn insert_prediction(&mut self, forecast: EnsembleForecast) {
        self.predictions.insert(forecast.prediction_date, forecast);
    }

    pub fn latest_prediction(&self) -> Option<&EnsembleForecast> {
        self.predictions.values().next_back()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub pipeline: Arc<WastePipeline>,
    pub forecast_source: Arc<dyn ForecastSource>,
    pub store: Arc<RwLock<ResultStore>>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        pipeline: WastePipeline,
        forecast_source: Arc<dyn ForecastSource>,
    ) -> Self {
        Self {
            health_registry,
            pipeline: Arc::new(pipeline),
            forecast_source,
            store: Arc::new(RwLock::new(ResultStore::default())),
        }
    }
}

/// Error body: `{kind, message}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, kind: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                kind: kind.to_string(),
                message: message.into(),
            },
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Ensemble(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Ingest(_) => StatusCode::BAD_REQUEST,
            Error::Source(_) | Error::Notify(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.kind(), err.to_string())
    }
}

impl From<waste_lib::EnsembleError> for ApiError {
    fn from(err: waste_lib::EnsembleError) -> Self {
        Error::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "invalid_body", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Score a batch of usage records and keep the ranked result
///
/// Elements are decoded individually so one bad record is skipped instead
/// of rejecting the whole batch.
async fn score_recommendations(
    State(state): State<AppState>,
    payload: Result<Json<Vec<Value>>, JsonRejection>,
) -> Result<Json<ScoringOutcome>, ApiError> {
    let Json(values) = payload?;
    let outcome = state.pipeline.score_values(values).await;

    state
        .store
        .write()
        .await
        .replace_recommendations(outcome.recommendations.clone());

    Ok(Json(outcome))
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationFilter {
    pub priority: Option<String>,
    pub status: Option<String>,
}

async fn list_recommendations(
    State(state): State<AppState>,
    Query(filter): Query<RecommendationFilter>,
) -> Result<Json<Vec<WasteRecommendation>>, ApiError> {
    let priority = filter
        .priority
        .as_deref()
        .map(str::parse::<Priority>)
        .transpose()
        .map_err(ApiError::bad_request)?;

    let store = state.store.read().await;
    let recommendations = store
        .recommendations()
        .iter()
        .filter(|r| priority.map_or(true, |p| r.priority == p))
        .filter(|r| {
            filter
                .status
                .as_deref()
                .map_or(true, |s| r.status.to_string().eq_ignore_ascii_case(s))
        })
        .cloned()
        .collect();

    Ok(Json(recommendations))
}

async fn get_recommendation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WasteRecommendation>, ApiError> {
    state
        .store
        .read()
        .await
        .recommendation(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no recommendation with id {}", id)))
}

#[derive(Debug, Default, Deserialize)]
pub struct RemediationQuery {
    pub min_priority: Option<String>,
    pub status: Option<String>,
}

/// Terraform plan for the stored recommendations
async fn remediation_plan(
    State(state): State<AppState>,
    Query(query): Query<RemediationQuery>,
) -> Result<Json<RemediationPlan>, ApiError> {
    let mut config = RemediationConfig::default();
    if let Some(priority) = query.min_priority.as_deref() {
        config.min_priority = priority.parse::<Priority>().map_err(ApiError::bad_request)?;
    }
    config.status = query
        .status
        .as_deref()
        .map(str::parse::<RecommendationStatus>)
        .transpose()
        .map_err(ApiError::bad_request)?;

    let store = state.store.read().await;
    let plan = build_plan(store.recommendations(), &config, Utc::now());
    info!(
        blocks = plan.blocks.len(),
        actionable = plan.actionable(),
        "Remediation plan generated"
    );

    Ok(Json(plan))
}

/// Both summaries are optional so that a missing one is reported, not rejected as malformed
#[derive(Debug, Default, Deserialize)]
pub struct PredictionRequest {
    #[serde(default)]
    pub statistical: Option<ForecastSummary>,
    #[serde(default)]
    pub ml: Option<ForecastSummary>,
}

async fn create_prediction(
    State(state): State<AppState>,
    payload: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<ForecastOutcome>, ApiError> {
    let Json(request) = payload?;
    let outcome = state
        .pipeline
        .combine(request.statistical, request.ml)
        .await?;

    state
        .store
        .write()
        .await
        .insert_prediction(outcome.forecast.clone());

    Ok(Json(outcome))
}

async fn run_prediction(State(state): State<AppState>) -> Result<Json<ForecastOutcome>, ApiError> {
    let outcome = state
        .pipeline
        .run_forecast(state.forecast_source.as_ref())
        .await?;

    state
        .store
        .write()
        .await
        .insert_prediction(outcome.forecast.clone());

    Ok(Json(outcome))
}

async fn latest_prediction(
    State(state): State<AppState>,
) -> Result<Json<EnsembleForecast>, ApiError> {
    state
        .store
        .read()
        .await
        .latest_prediction()
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("no ensemble forecast has been generated yet"))
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/recommendations", get(list_recommendations))
        .route("/api/v1/recommendations/score", post(score_recommendations))
        .route("/api/v1/recommendations/:id", get(get_recommendation))
        .route("/api/v1/remediation", get(remediation_plan))
        .route("/api/v1/predictions", post(create_prediction))
        .route("/api/v1/predictions/run", post(run_prediction))
        .route("/api/v1/predictions/latest", get(latest_prediction))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
