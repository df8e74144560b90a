use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{CacheKey, CacheStats};
use crate::config::minutes;
use crate::error::BotError;
use crate::jobs::{InteractionStats, JobStats, MentionStats};
use crate::quota::QuotaStats;
use crate::state::AppState;
use crate::throttle::ThrottleStats;

const RECENT_ERRORS_KEPT: usize = 20;
const RECENT_ERRORS_REPORTED: usize = 5;
const DEGRADED_AFTER_ERRORS: usize = 10;

// What a job is about to publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Market,
    Degen,
    Defi,
    Tips,
    Mentions,
}

pub fn is_maintenance(state: &AppState) -> bool {
    state.settings.features.maintenance_mode
        || state
            .cache
            .get_as::<bool>(&CacheKey::MaintenanceMode)
            .unwrap_or(false)
}

pub fn set_maintenance(state: &AppState, enabled: bool, reason: &str) {
    let ttl = minutes(24 * 60);
    state.cache.set_as(&CacheKey::MaintenanceMode, &enabled, ttl);
    if enabled {
        state.cache.set_as(&CacheKey::MaintenanceReason, &reason, ttl);
        tracing::warn!(reason, "maintenance mode enabled");
    } else {
        state.cache.delete(&CacheKey::MaintenanceReason);
        tracing::info!("maintenance mode disabled");
    }
}

pub fn should_post(state: &AppState, kind: ContentKind) -> bool {
    posting_blocked(state, kind).is_none()
}

/// Why publishing is currently off for this kind, if it is.
pub fn posting_blocked(state: &AppState, kind: ContentKind) -> Option<&'static str> {
    if is_maintenance(state) {
        tracing::info!(?kind, "skipping, maintenance mode");
        return Some("maintenance");
    }
    let features = &state.settings.features;
    let enabled = match kind {
        ContentKind::Market | ContentKind::Defi | ContentKind::Tips => features.auto_posts,
        ContentKind::Degen => features.degen_alerts,
        ContentKind::Mentions => features.mention_replies,
    };
    if enabled {
        None
    } else {
        tracing::info!(?kind, "skipping, feature disabled");
        Some("feature_disabled")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecentError {
    pub message: String,
    pub kind: String,
    pub context: Value,
    pub timestamp: String,
}

pub fn log_error(state: &AppState, error: &BotError, context: Value) {
    tracing::error!(error = %error, kind = error.kind(), %context, "error logged");

    let mut recent: Vec<RecentError> = state
        .cache
        .get_as(&CacheKey::RecentErrors)
        .unwrap_or_default();
    recent.push(RecentError {
        message: error.to_string(),
        kind: error.kind().to_string(),
        context,
        timestamp: chrono::Utc::now().to_rfc3339(),
    });
    if recent.len() > RECENT_ERRORS_KEPT {
        recent.drain(..recent.len() - RECENT_ERRORS_KEPT);
    }
    state
        .cache
        .set_as(&CacheKey::RecentErrors, &recent, minutes(24 * 60));
}

#[derive(Debug, Clone, Serialize)]
pub struct Features {
    pub maintenance_mode: bool,
    pub auto_posts_enabled: bool,
    pub mention_replies_enabled: bool,
    pub degen_alerts_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime_secs: u64,
    pub environment: String,
    pub features: Features,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance_reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recent_errors: Vec<RecentError>,
    pub cache: CacheStats,
    pub quota: QuotaStats,
    pub posting: ThrottleStats,
}

pub fn system_health(state: &AppState) -> SystemHealth {
    let recent: Vec<RecentError> = state
        .cache
        .get_as(&CacheKey::RecentErrors)
        .unwrap_or_default();
    let status = if recent.len() > DEGRADED_AFTER_ERRORS {
        "degraded"
    } else {
        "healthy"
    };
    let features = &state.settings.features;

    SystemHealth {
        status,
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        environment: state.settings.environment.clone(),
        features: Features {
            maintenance_mode: is_maintenance(state),
            auto_posts_enabled: features.auto_posts,
            mention_replies_enabled: features.mention_replies,
            degen_alerts_enabled: features.degen_alerts,
        },
        maintenance_reason: state.cache.get_as(&CacheKey::MaintenanceReason),
        recent_errors: recent
            .iter()
            .rev()
            .take(RECENT_ERRORS_REPORTED)
            .rev()
            .cloned()
            .collect(),
        cache: state.cache.stats(),
        quota: state.quota.stats(),
        posting: state.social.stats(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub market_updates: JobStats,
    pub degen_alerts: JobStats,
    pub defi_updates: JobStats,
    pub trading_tips: JobStats,
    pub mention_processing: MentionStats,
    pub global_interactions: InteractionStats,
    pub system_health: SystemHealth,
    pub timestamp: String,
}

pub fn analytics_report(state: &AppState) -> AnalyticsReport {
    let job = |name: &'static str| -> JobStats {
        state
            .cache
            .get_as(&CacheKey::JobStats(name))
            .unwrap_or_default()
    };

    AnalyticsReport {
        market_updates: job("market_update"),
        degen_alerts: job("degen_alert"),
        defi_updates: job("defi_update"),
        trading_tips: job("trading_tip"),
        mention_processing: state
            .cache
            .get_as(&CacheKey::JobStats("mention_processing"))
            .unwrap_or_default(),
        global_interactions: state
            .cache
            .get_as(&CacheKey::GlobalInteractionStats)
            .unwrap_or_default(),
        system_health: system_health(state),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}
