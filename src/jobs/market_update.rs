use serde_json::json;

use crate::cache::CacheKey;
use crate::config::minutes;
use crate::error::BotError;
use crate::formatter::{Template, truncate};
use crate::health::{ContentKind, log_error, posting_blocked};
use crate::jobs::JobReport;
use crate::state::AppState;

pub const JOB: &str = "market_update";

const FALLBACK: &str = "Market analysis temporarily unavailable. Stay tuned for updates! Always DYOR";

pub async fn run(state: &AppState) -> Result<JobReport, BotError> {
    if let Some(reason) = posting_blocked(state, ContentKind::Market) {
        return Ok(JobReport::skipped(JOB, reason));
    }

    match post_update(state).await {
        Ok(report) => Ok(report),
        Err(e) => {
            log_error(state, &e, json!({ "job": JOB }));
            match state.social.post(Template::MarketUpdate, FALLBACK).await {
                Ok(tweet) => tracing::info!(id = %tweet.id, "fallback market update posted"),
                Err(fallback) => tracing::warn!(error = %fallback, "fallback market update failed"),
            }
            Err(e)
        }
    }
}

async fn post_update(state: &AppState) -> Result<JobReport, BotError> {
    state.social.verify_credentials().await?;

    let usage = state.quota.stats();
    if usage.emergency_mode {
        if let Some(cached) = state.cache.get_as::<String>(&CacheKey::LastMarketAnalysis) {
            tracing::info!("emergency mode, reposting last analysis");
            let tweet = state
                .social
                .post(Template::MarketUpdate, &format!("{cached} (cached)"))
                .await?;
            return Ok(JobReport::completed(JOB)
                .with("mode", "emergency")
                .with("tweet_id", tweet.id)
                .with("analysis", truncate(&cached, 100)));
        }
    }

    let analysis = state.completion.market_analysis().await?;
    state
        .cache
        .set_as(&CacheKey::LastMarketAnalysis, &analysis, minutes(60));

    let tweet = state.social.post(Template::MarketUpdate, &analysis).await?;
    let usage = state.quota.stats();
    let posting = state.social.stats();

    Ok(JobReport::completed(JOB)
        .with("tweet_id", tweet.id)
        .with("analysis", truncate(&analysis, 100))
        .with(
            "stats",
            json!({
                "caps_used": usage.daily_count,
                "daily_ceiling": usage.daily_ceiling,
                "emergency_mode": usage.emergency_mode,
                "posts_this_hour": posting.posts_this_hour,
            }),
        ))
}
