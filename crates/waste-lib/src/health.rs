//! Component health for the waste detector agent
//!
//! The scorer, combiner, notifier and forecast source each report their
//! state here; `/healthz` and `/readyz` read it back. A failing notifier
//! only degrades the detector since results are still produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still producing results, with a side effect failing
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component is at least partially operational
    pub fn is_operational(&self) -> bool {
        *self != ComponentStatus::Unhealthy
    }
}

/// Last reported state of one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Failures reported since the component was last healthy
    #[serde(default)]
    pub consecutive_failures: u32,
    pub checked_at: DateTime<Utc>,
}

impl ComponentHealth {
    fn healthy() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            message: None,
            consecutive_failures: 0,
            checked_at: Utc::now(),
        }
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// The worst component status; an empty registry is healthy
    pub fn overall(components: &BTreeMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Names of the tracked detector components
pub mod components {
    pub const SCORER: &str = "scorer";
    pub const COMBINER: &str = "combiner";
    pub const NOTIFIER: &str = "notifier";
    pub const FORECAST_SOURCE: &str = "forecast_source";

    pub const ALL: [&str; 4] = [SCORER, COMBINER, NOTIFIER, FORECAST_SOURCE];
}

#[derive(Debug, Default)]
struct RegistryState {
    components: BTreeMap<String, ComponentHealth>,
    ready: bool,
}

/// Shared, cloneable view of detector health
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a component as healthy
    pub async fn register(&self, name: &str) {
        self.state
            .write()
            .await
            .components
            .insert(name.to_string(), ComponentHealth::healthy());
    }

    /// Start tracking every detector component
    pub async fn register_all(&self) {
        let mut state = self.state.write().await;
        for name in components::ALL {
            state
                .components
                .insert(name.to_string(), ComponentHealth::healthy());
        }
    }

    pub async fn status(&self, name: &str) -> Option<ComponentStatus> {
        self.state
            .read()
            .await
            .components
            .get(name)
            .map(|c| c.status)
    }

    async fn report_failure(&self, name: &str, status: ComponentStatus, message: String) {
        let mut state = self.state.write().await;
        let entry = state
            .components
            .entry(name.to_string())
            .or_insert_with(ComponentHealth::healthy);

        entry.status = status;
        entry.message = Some(message);
        entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
        entry.checked_at = Utc::now();
    }

    /// Mark a component healthy and clear its failure count
    pub async fn set_healthy(&self, name: &str) {
        self.state
            .write()
            .await
            .components
            .insert(name.to_string(), ComponentHealth::healthy());
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.report_failure(name, ComponentStatus::Degraded, message.into())
            .await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.report_failure(name, ComponentStatus::Unhealthy, message.into())
            .await;
    }

    pub async fn set_ready(&self, ready: bool) {
        self.state.write().await.ready = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.state.read().await.components.clone();
        HealthResponse {
            status: HealthResponse::overall(&components),
            components,
        }
    }

    /// Ready once initialized and while no component is unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        let overall = HealthResponse::overall(&state.components);

        let reason = match (state.ready, overall) {
            (false, _) => Some("Detector not yet initialized"),
            (true, ComponentStatus::Unhealthy) => Some("A detector component is unhealthy"),
            (true, _) => None,
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason: reason.map(str::to_string),
        }
    }
}
