use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::state::AppState;

mod cron;
mod health;
mod metrics;
mod webhook;

pub use cron::{
    content_handler, degen_alert_handler, maintenance_handler, market_update_handler,
    mentions_handler,
};
pub use health::{analytics_handler, health_handler};
pub use metrics::metrics_handler;
pub use webhook::twitter_webhook_handler;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/analytics", get(analytics_handler))
        .route("/api/cron/market-update", post(market_update_handler))
        .route("/api/cron/degen-alert", post(degen_alert_handler))
        .route("/api/cron/content/{slot}", post(content_handler))
        .route("/api/cron/mentions", post(mentions_handler))
        .route("/api/maintenance", post(maintenance_handler))
        .route("/api/webhooks/twitter", post(twitter_webhook_handler))
        .with_state(state)
}
