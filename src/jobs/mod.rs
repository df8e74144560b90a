//! Scheduled jobs. Each one gates on maintenance and feature flags, does
//! its work through the shared clients and reports what happened.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::cache::{CacheKey, ContentSlot};
use crate::config::{JobKind, minutes};
use crate::error::BotError;
use crate::formatter::{sanitize_handle, truncate};
use crate::metrics::JOB_LATENCY;
use crate::state::AppState;

pub mod content;
pub mod degen_alert;
pub mod market_update;
pub mod mentions;

const STATS_TTL_MINUTES: u64 = 7 * 24 * 60;
const ERROR_HISTORY_KEPT: usize = 10;
const USER_INTERACTIONS_KEPT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    MarketUpdate,
    DegenAlert { force: bool },
    Content(ContentSlot),
    Mentions,
}

impl Job {
    pub fn name(self) -> &'static str {
        match self {
            Job::MarketUpdate => market_update::JOB,
            Job::DegenAlert { .. } => degen_alert::JOB,
            Job::Content(slot) => content::template_for(slot).name(),
            Job::Mentions => mentions::JOB,
        }
    }
}

impl From<JobKind> for Job {
    fn from(kind: JobKind) -> Self {
        match kind {
            JobKind::MarketUpdate => Job::MarketUpdate,
            JobKind::DegenAlert => Job::DegenAlert { force: false },
            JobKind::ContentDefi => Job::Content(ContentSlot::Defi),
            JobKind::ContentTip => Job::Content(ContentSlot::Tip),
            JobKind::Mentions => Job::Mentions,
        }
    }
}

/// Outcome of a job run that did not fail.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job: &'static str,
    pub success: bool,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
    pub timestamp: String,
}

impl JobReport {
    pub fn completed(job: &'static str) -> Self {
        Self {
            job,
            success: true,
            skipped: false,
            reason: None,
            details: Map::new(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn skipped(job: &'static str, reason: &'static str) -> Self {
        Self {
            skipped: true,
            reason: Some(reason),
            ..Self::completed(job)
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobError {
    pub message: String,
    pub kind: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobStats {
    pub total: u64,
    pub successful: u64,
    pub skipped: u64,
    pub failed: u64,
    pub last_success: Option<String>,
    pub last_skip_reason: Option<String>,
    pub last_error: Option<JobError>,
    pub error_history: Vec<JobError>,
}

impl JobStats {
    fn record(&mut self, outcome: &Result<JobReport, BotError>) {
        let now = chrono::Utc::now().to_rfc3339();
        self.total += 1;
        match outcome {
            Ok(report) if report.skipped => {
                self.skipped += 1;
                self.last_skip_reason = report.reason.map(String::from);
            }
            Ok(_) => {
                self.successful += 1;
                self.last_success = Some(now);
            }
            Err(e) => {
                self.failed += 1;
                let error = JobError {
                    message: e.to_string(),
                    kind: e.kind().to_string(),
                    timestamp: now,
                };
                self.error_history.push(error.clone());
                if self.error_history.len() > ERROR_HISTORY_KEPT {
                    self.error_history.remove(0);
                }
                self.last_error = Some(error);
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MentionStats {
    pub total_processed: u64,
    pub successful_replies: u64,
    pub failed_replies: u64,
    pub last_processed: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InteractionStats {
    pub total_interactions: u64,
    pub unique_users: BTreeSet<String>,
    pub top_tokens_asked: BTreeMap<String, u64>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInteraction {
    pub timestamp: String,
    pub query: String,
    pub response: String,
}

/// Run a job, timing it and folding the outcome into its stats.
pub async fn run(state: &AppState, job: Job) -> Result<JobReport, BotError> {
    let name = job.name();
    tracing::info!(job = name, "job started");
    let timer = JOB_LATENCY.with_label_values(&[name]).start_timer();

    let outcome = match job {
        Job::MarketUpdate => market_update::run(state).await,
        Job::DegenAlert { force } => degen_alert::run(state, force).await,
        Job::Content(slot) => content::run(state, slot).await,
        Job::Mentions => mentions::run(state).await,
    };
    timer.observe_duration();

    // mention runs keep their own counters
    if job != Job::Mentions {
        record_outcome(state, name, &outcome);
    }
    match &outcome {
        Ok(report) if report.skipped => {
            tracing::info!(job = name, reason = report.reason, "job skipped")
        }
        Ok(_) => tracing::info!(job = name, "job completed"),
        Err(e) => tracing::error!(job = name, error = %e, "job failed"),
    }
    outcome
}

fn record_outcome(state: &AppState, job: &'static str, outcome: &Result<JobReport, BotError>) {
    let key = CacheKey::JobStats(job);
    let mut stats: JobStats = state.cache.get_as(&key).unwrap_or_default();
    stats.record(outcome);
    state.cache.set_as(&key, &stats, minutes(STATS_TTL_MINUTES));
}

/// Remember a completed exchange with a user and roll it into the global
/// interaction counters.
pub fn track_interaction(
    state: &AppState,
    username: &str,
    query: &str,
    response: &str,
    tokens: &[String],
) {
    let handle = sanitize_handle(username).to_lowercase();
    let now = chrono::Utc::now().to_rfc3339();

    let user_key = CacheKey::UserInteractions(handle.clone());
    let mut history: Vec<UserInteraction> = state.cache.get_as(&user_key).unwrap_or_default();
    history.push(UserInteraction {
        timestamp: now.clone(),
        query: truncate(query, 100),
        response: truncate(response, 100),
    });
    if history.len() > USER_INTERACTIONS_KEPT {
        history.drain(..history.len() - USER_INTERACTIONS_KEPT);
    }
    state
        .cache
        .set_as(&user_key, &history, minutes(STATS_TTL_MINUTES));

    let mut global: InteractionStats = state
        .cache
        .get_as(&CacheKey::GlobalInteractionStats)
        .unwrap_or_default();
    global.total_interactions += 1;
    global.unique_users.insert(handle);
    for token in tokens {
        *global.top_tokens_asked.entry(token.clone()).or_default() += 1;
    }
    global.last_updated = Some(now);
    state
        .cache
        .set_as(&CacheKey::GlobalInteractionStats, &global, minutes(24 * 60));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn stats_count_outcomes_and_cap_history() {
        let mut stats = JobStats::default();
        stats.record(&Ok(JobReport::completed("market_update")));
        stats.record(&Ok(JobReport::skipped("market_update", "maintenance")));
        for _ in 0..12 {
            stats.record(&Err(BotError::EmptyCompletion));
        }

        assert_eq!(stats.total, 14);
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 12);
        assert_eq!(stats.last_skip_reason.as_deref(), Some("maintenance"));
        assert_eq!(stats.error_history.len(), 10);
        assert_eq!(stats.last_error.map(|e| e.kind), Some("crestal_api".to_string()));
    }

    #[test]
    fn reports_flatten_details() {
        let report = JobReport::skipped("degen_alert", "rate_limited").with("caps_used", 12);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["reason"], "rate_limited");
        assert_eq!(json["caps_used"], 12);
        assert_eq!(json["skipped"], true);
    }

    #[test]
    fn interactions_are_tracked_per_user_and_globally() {
        let state = AppState::new(Settings::default()).unwrap();
        let tokens = vec!["BTC".to_string()];
        for _ in 0..22 {
            track_interaction(&state, "Alice", "price of $BTC?", "BTC at 60k", &tokens);
        }
        track_interaction(&state, "bob", "gm", "gm", &[]);

        let history: Vec<UserInteraction> = state
            .cache
            .get_as(&CacheKey::UserInteractions("alice".to_string()))
            .unwrap();
        assert_eq!(history.len(), 20);

        let global: InteractionStats = state
            .cache
            .get_as(&CacheKey::GlobalInteractionStats)
            .unwrap();
        assert_eq!(global.total_interactions, 23);
        assert_eq!(global.unique_users.len(), 2);
        assert_eq!(global.top_tokens_asked.get("BTC"), Some(&22));
    }

    #[test]
    fn job_kinds_map_to_jobs() {
        assert_eq!(Job::from(JobKind::DegenAlert), Job::DegenAlert { force: false });
        assert_eq!(Job::from(JobKind::ContentTip).name(), "trading_tip");
        assert_eq!(Job::from(JobKind::ContentDefi).name(), "defi_update");
    }
}
