use serde_json::json;

use crate::cache::CacheKey;
use crate::config::minutes;
use crate::error::BotError;
use crate::formatter::{extract_tokens, format_analysis_response, strip_mention};
use crate::health::{ContentKind, log_error, posting_blocked};
use crate::jobs::{JobReport, MentionStats, track_interaction};
use crate::models::Mention;
use crate::state::AppState;

pub const JOB: &str = "mention_processing";

// Anything shorter is a bare tag, not a question
const MIN_QUERY_CHARS: usize = 3;

#[derive(Debug, Default)]
struct Tally {
    processed: u64,
    successful: u64,
    failed: u64,
    skipped: u64,
    errors: Vec<String>,
}

/// Answer new mentions of the bot and advance the mention cursor.
pub async fn run(state: &AppState) -> Result<JobReport, BotError> {
    if let Some(reason) = posting_blocked(state, ContentKind::Mentions) {
        return Ok(JobReport::skipped(JOB, reason));
    }

    let since = state.social.last_mention_id();
    let batch = match state.social.mentions(since.as_deref()).await {
        Ok(batch) => batch,
        Err(e) => {
            log_error(state, &e, json!({ "job": JOB }));
            return Err(e);
        }
    };

    let mut tally = Tally::default();
    for mention in &batch.mentions {
        answer(state, mention, &mut tally).await;
        if !state.settings.reply_delay.is_zero() {
            tokio::time::sleep(state.settings.reply_delay).await;
        }
    }

    // re-store the cursor even on an empty batch so it never lapses
    if let Some(cursor) = batch.newest_id.as_deref().or(since.as_deref()) {
        state.social.set_last_mention_id(cursor);
    }
    record(state, &tally);

    let usage = state.quota.stats();
    Ok(JobReport::completed(JOB)
        .with("found", batch.mentions.len())
        .with("processed", tally.processed)
        .with("successful", tally.successful)
        .with("failed", tally.failed)
        .with("skipped", tally.skipped)
        .with("errors", tally.errors)
        .with(
            "stats",
            json!({
                "caps_used": usage.daily_count,
                "emergency_mode": usage.emergency_mode,
                "posts_this_hour": state.social.stats().posts_this_hour,
            }),
        ))
}

async fn answer(state: &AppState, mention: &Mention, tally: &mut Tally) {
    let author = mention.author_username.as_str();
    if author.eq_ignore_ascii_case(state.social.bot_handle()) {
        return;
    }

    // answered already; don't spend quota finding that out
    if state.ledger.contains(&mention.id) {
        tally.skipped += 1;
        return;
    }

    let query = strip_mention(&mention.text, state.social.bot_handle());
    if query.chars().count() < MIN_QUERY_CHARS {
        tally.skipped += 1;
        return;
    }

    let answer = match state.completion.analyze_user_query(&query, Some(author)).await {
        Ok(answer) => answer,
        Err(e) if e.is_rate_limit() => {
            tracing::info!(error = %e, tweet_id = %mention.id, "skipping mention");
            tally.skipped += 1;
            return;
        }
        Err(e) => {
            tracing::warn!(error = %e, tweet_id = %mention.id, "answering with fallback");
            e.reply_text().to_string()
        }
    };

    let tokens = extract_tokens(&query);
    let response = format_analysis_response(&answer, &tokens);

    match state.social.reply(&mention.id, &response, author).await {
        Ok(_) => {
            tally.processed += 1;
            tally.successful += 1;
            track_interaction(state, author, &query, &response, &tokens);
        }
        Err(BotError::AlreadyReplied(_)) => tally.skipped += 1,
        Err(e) => {
            tally.processed += 1;
            tally.failed += 1;
            tally.errors.push(format!("failed to reply to @{author}: {e}"));
        }
    }
}

fn record(state: &AppState, tally: &Tally) {
    let key = CacheKey::JobStats(JOB);
    let mut stats: MentionStats = state.cache.get_as(&key).unwrap_or_default();
    stats.total_processed += tally.processed;
    stats.successful_replies += tally.successful;
    stats.failed_replies += tally.failed;
    stats.last_processed = Some(chrono::Utc::now().to_rfc3339());
    state.cache.set_as(&key, &stats, minutes(24 * 60));
}
