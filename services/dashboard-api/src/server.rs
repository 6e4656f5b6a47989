//! HTTP surface of the dashboard.
//!
//! Provides endpoints for:
//! - Health and Prometheus metrics
//! - The current layout (sidebar and main regions)
//! - UI events, applied through the controller's event loop

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, warn};

use dashboard::{DashboardError, EventSender, LayoutHandle, UiEvent};

// ============================================================================
// Shared State
// ============================================================================

pub struct AppState {
    pub events: EventSender,
    pub layout: LayoutHandle,
    pub prometheus: Option<PrometheusHandle>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct EventResponse {
    pub callback: &'static str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Router
// ============================================================================

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/layout", get(layout_handler))
        .route("/events", post(events_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health - Liveness check
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus metrics endpoint
pub async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    match &state.prometheus {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics exporter not installed\n").into_response(),
    }
}

/// GET /layout - Current sidebar and main region
pub async fn layout_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    Json(state.layout.snapshot()).into_response()
}

/// POST /events - Apply one UI event and wait for it to finish
pub async fn events_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(event): Json<UiEvent>,
) -> Response {
    let callback = event.callback_name();

    match state.events.dispatch(event).await {
        Ok(()) => {
            counter!("dashboard_http_events_total", "status" => "ok").increment(1);
            let body = EventResponse {
                callback,
                status: "ok",
                error: None,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                counter!("dashboard_http_events_total", "status" => "error").increment(1);
                warn!(callback, error = %e, status = status.as_u16(), "Event failed");
            } else {
                counter!("dashboard_http_events_total", "status" => "rejected").increment(1);
                debug!(callback, error = %e, "Event rejected");
            }
            let body = EventResponse {
                callback,
                status: "error",
                error: Some(e.to_string()),
            };
            (status, Json(body)).into_response()
        }
    }
}

/// HTTP status for a failed event.
pub fn status_for(err: &DashboardError) -> StatusCode {
    match err {
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        DashboardError::Closed => StatusCode::SERVICE_UNAVAILABLE,
        DashboardError::Open(e) if !e.is_format() => StatusCode::BAD_GATEWAY,
        DashboardError::Catalog(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
