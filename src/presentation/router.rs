// Route table for the view API
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    acknowledge, active_alerts, alert_history, clear_alerts, emergency, get_settings,
    health_check, history, put_settings, status,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/status", get(status))
        .route("/history", get(history))
        .route("/alerts", get(active_alerts))
        .route("/alerts/history", get(alert_history))
        .route("/alerts/ack", post(acknowledge))
        .route("/alerts/clear", post(clear_alerts))
        .route("/settings", get(get_settings).put(put_settings))
        .route("/emergency", get(emergency))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
