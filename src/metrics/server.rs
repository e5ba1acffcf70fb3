//! HTTP server for the Prometheus endpoint.

use crate::metrics::PipelineMetrics;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;

/// Metrics server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),

    /// The server failed while running.
    #[error("server error: {0}")]
    Server(String),
}

/// Where the exporter listens.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Listen address.
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], 9090).into(),
        }
    }
}

impl MetricsServerConfig {
    /// All interfaces on `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], port).into(),
        }
    }
}

/// Serves `/metrics` and `/health`.
pub struct MetricsServer {
    config: MetricsServerConfig,
    metrics: Arc<PipelineMetrics>,
}

impl MetricsServer {
    /// Server exporting `metrics`.
    pub fn new(config: MetricsServerConfig, metrics: Arc<PipelineMetrics>) -> Self {
        Self { config, metrics }
    }

    /// Builds the router without binding, so it can be mounted elsewhere.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .layer(CorsLayer::permissive())
            .with_state(Arc::clone(&self.metrics))
    }

    /// Runs the server until the task is cancelled.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!(addr = %self.config.bind_addr, "Metrics server listening");

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))?;

        Ok(())
    }
}

async fn metrics_handler(State(metrics): State<Arc<PipelineMetrics>>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
    }
}

async fn health_handler(State(metrics): State<Arc<PipelineMetrics>>) -> impl IntoResponse {
    health_report(&metrics)
}

/// `503` until the first frame has gone through, then frame and drop totals.
fn health_report(metrics: &PipelineMetrics) -> (StatusCode, String) {
    let processed = metrics.frames_processed();
    if processed == 0 {
        return (StatusCode::SERVICE_UNAVAILABLE, "waiting for first frame".into());
    }
    (
        StatusCode::OK,
        format!("OK: {} frames, {} dropped", processed, metrics.frames_dropped()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsSnapshot;

    #[test]
    fn test_config_with_port() {
        let config = MetricsServerConfig::with_port(8080);
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(MetricsServerConfig::default().bind_addr.port(), 9090);
    }

    #[test]
    fn test_health_waits_for_frames() {
        let metrics = PipelineMetrics::new().unwrap();
        assert_eq!(health_report(&metrics).0, StatusCode::SERVICE_UNAVAILABLE);

        metrics.update(&MetricsSnapshot {
            frames_processed: 12,
            frames_dropped: 1,
            ..Default::default()
        });
        assert_eq!(
            health_report(&metrics),
            (StatusCode::OK, "OK: 12 frames, 1 dropped".to_string())
        );
    }
}
