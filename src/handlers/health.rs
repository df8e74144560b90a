use axum::{Json, extract::State};
use std::sync::Arc;

use crate::health::{AnalyticsReport, SystemHealth, analytics_report, system_health};
use crate::state::AppState;

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<SystemHealth> {
    Json(system_health(&state))
}

pub async fn analytics_handler(State(state): State<Arc<AppState>>) -> Json<AnalyticsReport> {
    Json(analytics_report(&state))
}
