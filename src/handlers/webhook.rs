use axum::{Json, extract::State};
use std::sync::Arc;

use crate::error::BotError;
use crate::jobs::{self, Job, JobReport};
use crate::metrics::REQUEST_TOTAL;
use crate::state::AppState;

// Platform callback; the body is ignored and new mentions are pulled
pub async fn twitter_webhook_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JobReport>, BotError> {
    REQUEST_TOTAL.inc();
    tracing::info!("twitter webhook triggered");
    jobs::run(&state, Job::Mentions).await.map(Json)
}
