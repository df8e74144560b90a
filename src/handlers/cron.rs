use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, header::AUTHORIZATION},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::cache::ContentSlot;
use crate::error::BotError;
use crate::health::{is_maintenance, set_maintenance};
use crate::jobs::{self, Job, JobReport};
use crate::metrics::REQUEST_TOTAL;
use crate::state::AppState;

// Cron triggers carry `Authorization: Bearer <CRON_SECRET>`
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), BotError> {
    let secret = state.settings.cron_secret.as_str();
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(token) if !secret.is_empty() && token == secret => Ok(()),
        _ => {
            tracing::warn!("unauthorized cron request");
            Err(BotError::Unauthorized)
        }
    }
}

async fn trigger(
    state: &AppState,
    headers: &HeaderMap,
    job: Job,
) -> Result<Json<JobReport>, BotError> {
    REQUEST_TOTAL.inc();
    authorize(state, headers)?;
    jobs::run(state, job).await.map(Json)
}

pub async fn market_update_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<JobReport>, BotError> {
    trigger(&state, &headers, Job::MarketUpdate).await
}

#[derive(Debug, Deserialize)]
pub struct DegenParams {
    #[serde(default)]
    force: bool,
}

pub async fn degen_alert_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DegenParams>,
    headers: HeaderMap,
) -> Result<Json<JobReport>, BotError> {
    trigger(&state, &headers, Job::DegenAlert { force: params.force }).await
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotParam {
    Defi,
    Tip,
}

pub async fn content_handler(
    State(state): State<Arc<AppState>>,
    Path(slot): Path<SlotParam>,
    headers: HeaderMap,
) -> Result<Json<JobReport>, BotError> {
    let slot = match slot {
        SlotParam::Defi => ContentSlot::Defi,
        SlotParam::Tip => ContentSlot::Tip,
    };
    trigger(&state, &headers, Job::Content(slot)).await
}

pub async fn mentions_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<JobReport>, BotError> {
    trigger(&state, &headers, Job::Mentions).await
}

#[derive(Debug, Deserialize)]
pub struct MaintenanceRequest {
    enabled: bool,
    #[serde(default)]
    reason: Option<String>,
}

pub async fn maintenance_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<MaintenanceRequest>,
) -> Result<Json<Value>, BotError> {
    REQUEST_TOTAL.inc();
    authorize(&state, &headers)?;

    let reason = request.reason.as_deref().unwrap_or("manual");
    set_maintenance(&state, request.enabled, reason);

    Ok(Json(json!({
        "success": true,
        "maintenance_mode": is_maintenance(&state),
        "reason": request.enabled.then_some(reason),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}
