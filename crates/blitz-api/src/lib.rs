//! Signal-ingestion HTTP endpoint.
//!
//! Accepts upstream alerts on `POST /api/signals/create`, guarded by a
//! shared-secret header, normalizes them, and forwards them into the
//! dispatcher channel. The HTTP response never waits on trade execution.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use axum::Router;
use blitz_core::{RawSignal, Signal};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Header carrying the shared secret.
pub const SECRET_HEADER: &str = "x-admin-secret";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address, e.g. "0.0.0.0:3000".
    pub bind: String,
    /// Shared secret upstream alerts must present.
    pub secret: String,
}

#[derive(Clone)]
pub struct ApiState {
    secret: Arc<String>,
    signals: mpsc::Sender<Signal>,
}

impl ApiState {
    pub fn new(secret: String, signals: mpsc::Sender<Signal>) -> Self {
        Self {
            secret: Arc::new(secret),
            signals,
        }
    }
}

/// Build the signal router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/signals/create", post(create_signal))
        .route("/api/signals/result", post(report_result))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(config: ApiConfig, signals: mpsc::Sender<Signal>) -> ApiResult<()> {
    let state = ApiState::new(config.secret, signals);
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!(bind = %config.bind, "Signal receiver listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn authorized(state: &ApiState, headers: &HeaderMap) -> bool {
    headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|provided| !state.secret.is_empty() && provided == state.secret.as_str())
}

async fn create_signal(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(raw): Json<RawSignal>,
) -> impl IntoResponse {
    if !authorized(&state, &headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Unauthorized"})),
        );
    }

    let signal = raw.normalize();
    info!(
        id = %signal.id,
        asset = %signal.asset,
        direction = %signal.direction,
        duration = signal.duration_minutes,
        "Signal received"
    );

    let id = signal.id.clone();
    // Respond immediately; execution happens behind the channel
    if let Err(e) = state.signals.try_send(signal) {
        warn!(error = %e, "Signal channel full, dropping signal");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "Busy"})),
        );
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({"status": "success", "signalId": id})),
    )
}

#[derive(Debug, Deserialize)]
struct ResultReport {
    #[serde(rename = "signalId")]
    signal_id: Option<String>,
    signal: Option<String>,
}

async fn report_result(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(report): Json<ResultReport>,
) -> impl IntoResponse {
    if !authorized(&state, &headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Unauthorized"})),
        );
    }

    info!(
        signal_id = report.signal_id.as_deref().unwrap_or("-"),
        outcome = report.signal.as_deref().unwrap_or("-"),
        "Signal outcome reported"
    );
    (StatusCode::OK, Json(serde_json::json!({"status": "success"})))
}
