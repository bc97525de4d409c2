//! Waste Agent - cloud waste detection service
//!
//! Scores billing usage for wasteful spend, combines cost forecasts
//! and raises alerts, exposing everything over HTTP.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use waste_agent::{api, config::AgentConfig, notifier::WebhookNotifier};
use waste_lib::{
    alert::{LogNotifier, Notifier},
    forecast::DirectoryForecastSource,
    HealthRegistry, StructuredLogger, WastePipeline,
};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting waste-agent");

    let config = AgentConfig::load()?;
    info!(
        node_name = %config.node_name,
        forecast_dir = %config.forecast_dir.display(),
        webhook = config.webhook_url.is_some(),
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;

    let logger = StructuredLogger::new(&config.node_name);
    logger.log_startup(AGENT_VERSION, config.api_port);

    let notifier: Arc<dyn Notifier> = match &config.webhook_url {
        Some(url) => Arc::new(
            WebhookNotifier::new(url.as_str(), Duration::from_secs(config.notifier_timeout_secs))
                .context("Failed to build webhook notifier")?,
        ),
        None => {
            warn!("No webhook configured, alerts will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let forecast_source = Arc::new(DirectoryForecastSource::new(config.forecast_dir.clone()));

    let pipeline = WastePipeline::new(config.pipeline_config())
        .with_notifier(notifier)
        .with_health(health_registry.clone());

    let app_state = api::AppState::new(health_registry.clone(), pipeline, forecast_source);

    health_registry.set_ready(true).await;

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        result = api_handle => {
            let reason = match result {
                Ok(Ok(())) => "API server stopped".to_string(),
                Ok(Err(e)) => format!("API server failed: {e:#}"),
                Err(e) => format!("API server task panicked: {e}"),
            };
            logger.log_shutdown(&reason);
            anyhow::bail!(reason);
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            logger.log_shutdown("SIGINT received");
        }
    }

    info!("Shutting down");
    Ok(())
}
