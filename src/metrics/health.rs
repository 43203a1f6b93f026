//! Health check endpoints and Prometheus metrics server
//!
//! HTTP endpoints for liveness and Prometheus scraping using Axum.

use crate::metrics::collector::MetricsCollector;
use crate::reconcile::Reconciler;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health server configuration
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Shared state for the health server
#[derive(Clone)]
pub struct HealthServerState {
    pub metrics_collector: Arc<MetricsCollector>,
    pub reconciler: Option<Reconciler>,
    pub chat_connected: Arc<AtomicBool>,
}

impl HealthServerState {
    /// Overall status from chat connectivity and the last pass
    pub fn status(&self) -> HealthStatus {
        let Some(reconciler) = &self.reconciler else {
            return HealthStatus::Unhealthy;
        };
        if !self.chat_connected.load(Ordering::Relaxed) {
            return HealthStatus::Unhealthy;
        }
        if reconciler.stats().last_pass_registry_unavailable {
            return HealthStatus::Degraded;
        }
        HealthStatus::Healthy
    }
}

/// Health server that provides HTTP endpoints for monitoring
pub struct HealthServer {
    config: HealthServerConfig,
    state: HealthServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthServer {
    pub fn new(config: HealthServerConfig, metrics_collector: Arc<MetricsCollector>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state: HealthServerState {
                metrics_collector,
                reconciler: None,
                chat_connected: Arc::new(AtomicBool::new(false)),
            },
            shutdown_tx,
        }
    }

    /// Report on this reconciler's statistics
    pub fn with_reconciler(mut self, reconciler: Reconciler) -> Self {
        self.state.reconciler = Some(reconciler);
        self
    }

    /// Share the chat connectivity flag
    pub fn with_chat_status(mut self, chat_connected: Arc<AtomicBool>) -> Self {
        self.state.chat_connected = chat_connected;
        self
    }

    /// Start the health server, running until `stop` is called
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid health server address")?;

        let app = self.create_router();
        let listener = TcpListener::bind(addr).await?;

        info!("Health server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Health server shutdown signal received");
            })
            .await?;

        info!("Health server stopped");
        Ok(())
    }

    /// Create the Axum router with all health endpoints
    pub fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state.clone())
    }

    pub fn stop(&self) {
        if self.shutdown_tx.send(()).is_err() {
            warn!("Health server was not running");
        }
    }
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "lobby-keeper",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/metrics"]
    }))
}

async fn health_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Health check requested");

    let status = state.status();
    let code = match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    let body = match &state.reconciler {
        Some(reconciler) => json!({
            "status": status,
            "service": "lobby-keeper",
            "version": env!("CARGO_PKG_VERSION"),
            "chat_connected": state.chat_connected.load(Ordering::Relaxed),
            "pending_creations": reconciler.pending_creations(),
            "stats": reconciler.stats(),
        }),
        None => json!({
            "status": status,
            "service": "lobby-keeper",
            "version": env!("CARGO_PKG_VERSION"),
            "error": "Service not initialized"
        }),
    };

    (code, Json(body))
}

async fn metrics_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    // In-flight creations are read live rather than only when one settles
    if let Some(reconciler) = &state.reconciler {
        state
            .metrics_collector
            .pending_creations
            .set(reconciler.pending_creations() as i64);
    }

    match state.metrics_collector.encode_text() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        ),
        Err(e) => {
            error!("{}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                "Failed to encode metrics".to_string(),
            )
        }
    }
}
