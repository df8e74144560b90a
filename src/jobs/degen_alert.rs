use chrono::{DateTime, Utc};
use serde_json::json;
use std::time::Duration;

use crate::cache::CacheKey;
use crate::config::minutes;
use crate::error::BotError;
use crate::formatter::{Template, truncate};
use crate::health::{ContentKind, log_error, posting_blocked};
use crate::jobs::JobReport;
use crate::similarity::SimilarityGate;
use crate::state::AppState;

pub const JOB: &str = "degen_alert";

const FALLBACK: &str =
    "Degen radars temporarily offline! Stay alert for those moon missions! 🚀 Always DYOR";

// Alert bookkeeping outlives the minimum interval
const MEMORY_TTL_MINUTES: u64 = 8 * 60;
const SIMILAR_SKIP_TTL_MINUTES: u64 = 6 * 60;

/// Post a degen alert unless one went out recently, the quota reserve is
/// at risk or the new alert repeats the last one. `force` skips the
/// interval check.
pub async fn run(state: &AppState, force: bool) -> Result<JobReport, BotError> {
    if let Some(reason) = posting_blocked(state, ContentKind::Degen) {
        return Ok(JobReport::skipped(JOB, reason));
    }

    match post_alert(state, force).await {
        Ok(report) => Ok(report),
        Err(e) => {
            log_error(state, &e, json!({ "job": JOB, "force": force }));
            if !e.is_rate_limit() {
                match state.social.post(Template::DegenAlert, FALLBACK).await {
                    Ok(tweet) => tracing::info!(id = %tweet.id, "fallback degen alert posted"),
                    Err(fallback) => {
                        tracing::warn!(error = %fallback, "fallback degen alert failed")
                    }
                }
            }
            Err(e)
        }
    }
}

async fn post_alert(state: &AppState, force: bool) -> Result<JobReport, BotError> {
    state.social.verify_credentials().await?;
    let limits = &state.settings.limits;
    let now = Utc::now();

    if !force {
        let last = state.cache.get_as::<i64>(&CacheKey::LastDegenAlertTime);
        if let Some(next) = last.and_then(|ms| next_alert_due(ms, now, limits.degen_min_interval)) {
            tracing::info!(next_alert = %next, "degen alert posted recently");
            return Ok(JobReport::skipped(JOB, "rate_limited").with("next_alert", next.to_rfc3339()));
        }
    }

    let before = state.quota.stats();
    if before.emergency_mode {
        return Ok(JobReport::skipped(JOB, "emergency_mode").with("caps_used", before.daily_count));
    }
    // keep a reserve of calls for mentions and scheduled content
    let spendable = before.daily_ceiling.saturating_sub(limits.degen_quota_reserve);
    if before.daily_count > spendable {
        return Ok(JobReport::skipped(JOB, "cap_conservation")
            .with("caps_used", before.daily_count)
            .with("spendable", spendable));
    }

    let alert = state.completion.degen_alert().await?;

    let previous = state.cache.get_as::<String>(&CacheKey::LastDegenAlertContent);
    let gate = SimilarityGate::new(limits.degen_similarity);
    if previous.is_some_and(|prev| gate.is_similar(&alert, &prev)) {
        // count the attempt so the next one waits a full interval
        state.cache.set_as(
            &CacheKey::LastDegenAlertTime,
            &now.timestamp_millis(),
            minutes(SIMILAR_SKIP_TTL_MINUTES),
        );
        return Ok(JobReport::skipped(JOB, "similar_content"));
    }

    let length = alert.chars().count();
    if length < limits.degen_min_len {
        return Ok(JobReport::skipped(JOB, "content_too_short").with("alert_length", length));
    }

    let tweet = state.social.post(Template::DegenAlert, &alert).await?;
    state.cache.set_as(
        &CacheKey::LastDegenAlertTime,
        &now.timestamp_millis(),
        minutes(MEMORY_TTL_MINUTES),
    );
    state.cache.set_as(
        &CacheKey::LastDegenAlertContent,
        &alert,
        minutes(MEMORY_TTL_MINUTES),
    );

    let after = state.quota.stats();
    Ok(JobReport::completed(JOB)
        .with("tweet_id", tweet.id)
        .with("alert", truncate(&alert, 100))
        .with("forced", force)
        .with(
            "stats",
            json!({
                "caps_used_for_alert": after.daily_count.saturating_sub(before.daily_count),
                "total_caps_used": after.daily_count,
                "posts_this_hour": state.social.stats().posts_this_hour,
            }),
        ))
}

/// When the next alert may go out, if that is still in the future.
pub fn next_alert_due(
    last_ms: i64,
    now: DateTime<Utc>,
    min_interval: Duration,
) -> Option<DateTime<Utc>> {
    let interval_ms = i64::try_from(min_interval.as_millis()).unwrap_or(i64::MAX);
    let next = DateTime::from_timestamp_millis(last_ms.saturating_add(interval_ms))?;
    (next > now).then_some(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_alert_only_in_the_future() {
        let now = Utc::now();
        let interval = minutes(4 * 60);

        let an_hour_ago = (now - chrono::Duration::hours(1)).timestamp_millis();
        let next = next_alert_due(an_hour_ago, now, interval).unwrap();
        assert_eq!(
            next.timestamp_millis(),
            an_hour_ago + 4 * 60 * 60 * 1000
        );

        let five_hours_ago = (now - chrono::Duration::hours(5)).timestamp_millis();
        assert_eq!(next_alert_due(five_hours_ago, now, interval), None);
    }
}
