use crate::query::funnel::OrderFunnelMetrics;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared server state: the funnel medians computed once at startup.
///
/// Both values are immutable after the pipeline finishes, so concurrent
/// readers need no synchronization.
pub struct AppState {
    pub metrics: OrderFunnelMetrics,
}

/// Build the Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/metrics/orders", get(order_metrics))
        .route("/health", get(health_check))
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            std::time::Duration::from_secs(30),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /metrics/orders — the two funnel medians as an array of single-key
/// objects. A median with no qualifying customers serializes as `null`;
/// that is a valid result, not an error status.
async fn order_metrics(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!([
        {
            "median_visits_before_order_query":
                state.metrics.median_visits_before_order
        },
        {
            "median_session_duration_minutes_before_order":
                state.metrics.median_session_duration_minutes
        },
    ]))
}

/// GET /health — Simple health check endpoint.
async fn health_check() -> &'static str {
    "ok"
}
