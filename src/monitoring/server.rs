//! HTTP surface: axum server exposing the balloon history to the UI.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::enrichment::Enricher;

/// Shared state accessible by all route handlers.
#[derive(Clone)]
pub struct ApiState {
    enricher: Arc<Enricher>,
    started_at: DateTime<Utc>,
}

impl ApiState {
    pub fn new(enricher: Arc<Enricher>) -> Self {
        Self {
            enricher,
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthBody {
    status: &'static str,
    started_at: DateTime<Utc>,
    uptime_seconds: i64,
    cache_enabled: bool,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/balloons", get(balloons_handler))
        .route("/api/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until Ctrl-C, then drain in-flight requests.
pub async fn serve(state: ApiState, bind: &str, port: u16) -> Result<()> {
    let addr = format!("{bind}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server on {addr}"))?;

    info!(addr = %addr, "API server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C, serving until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// -- Route Handlers --

async fn balloons_handler(State(state): State<ApiState>) -> Response {
    match state.enricher.build_history().await {
        Ok(history) => Json(history).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to build balloon history");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "could not build balloon history"})),
            )
                .into_response()
        }
    }
}

async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthBody {
        status: "ok",
        started_at: state.started_at,
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        cache_enabled: state.enricher.cache().is_enabled(),
    })
}
