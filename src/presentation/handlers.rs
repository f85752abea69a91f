// HTTP request handlers
use crate::application::device_source::SourceError;
use crate::domain::history::{HistoryPoint, Metric};
use crate::domain::settings::Settings;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

const DEFAULT_HISTORY_HOURS: i64 = 24;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<SourceError> for ApiError {
    fn from(e: SourceError) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

#[derive(Deserialize)]
pub struct MetricQuery {
    pub metric: Option<String>,
}

#[derive(Deserialize)]
pub struct HoursQuery {
    pub hours: Option<i64>,
}

#[derive(Deserialize)]
pub struct AckBody {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub cleared: usize,
}

#[derive(Serialize)]
pub struct EmergencyResponse {
    pub message: String,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Latest processed tick, or 204 before the first sample arrives
pub async fn status(State(state): State<Arc<AppState>>) -> Response {
    match state.monitor.lock().await.snapshot() {
        Some(snapshot) => Json(snapshot).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Pruned history series, all metrics unless one is named
pub async fn history(
    Query(query): Query<MetricQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<Metric, Vec<HistoryPoint>>>, ApiError> {
    let metrics = match query.metric.as_deref() {
        Some(name) => vec![Metric::parse(name).ok_or_else(|| {
            ApiError::new(StatusCode::BAD_REQUEST, format!("unknown metric '{}'", name))
        })?],
        None => Metric::ALL.to_vec(),
    };

    let monitor = state.monitor.lock().await;
    Ok(Json(
        metrics
            .into_iter()
            .map(|metric| (metric, monitor.history(metric)))
            .collect(),
    ))
}

pub async fn active_alerts(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.alerts.active(Utc::now()).await)
}

pub async fn alert_history(
    Query(query): Query<HoursQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let hours = query.hours.unwrap_or(DEFAULT_HISTORY_HOURS).max(0);
    let window = TimeDelta::try_hours(hours).unwrap_or(TimeDelta::MAX);
    Json(state.alerts.history(window, Utc::now()).await)
}

pub async fn acknowledge(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AckBody>,
) -> Result<StatusCode, ApiError> {
    state.alerts.acknowledge(&body.kind).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_alerts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ClearResponse>, ApiError> {
    let cleared = state.alerts.clear_all().await?;
    Ok(Json(ClearResponse { cleared }))
}

pub async fn get_settings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.settings.current())
}

pub async fn put_settings(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Settings>,
) -> Result<Json<Settings>, ApiError> {
    let settings = state
        .settings
        .update(body.refresh_interval_ms)
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)))?;
    Ok(Json(settings))
}

/// Share text for calling emergency services
pub async fn emergency(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let last_fix = state.monitor.lock().await.last_fix();
    Json(EmergencyResponse {
        message: state.alerts.emergency_message(last_fix).await,
    })
}
