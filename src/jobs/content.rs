use serde_json::json;

use crate::cache::{CacheKey, ContentSlot};
use crate::config::minutes;
use crate::error::BotError;
use crate::formatter::{Template, truncate};
use crate::health::{ContentKind, log_error, posting_blocked};
use crate::jobs::JobReport;
use crate::similarity::SimilarityGate;
use crate::state::AppState;

pub fn template_for(slot: ContentSlot) -> Template {
    match slot {
        ContentSlot::Defi => Template::DefiUpdate,
        ContentSlot::Tip => Template::TradingTip,
    }
}

fn kind_for(slot: ContentSlot) -> ContentKind {
    match slot {
        ContentSlot::Defi => ContentKind::Defi,
        ContentSlot::Tip => ContentKind::Tips,
    }
}

// Scheduled DeFi summaries and trading tips
pub async fn run(state: &AppState, slot: ContentSlot) -> Result<JobReport, BotError> {
    let template = template_for(slot);
    let job = template.name();
    if let Some(reason) = posting_blocked(state, kind_for(slot)) {
        return Ok(JobReport::skipped(job, reason));
    }

    let result = post_content(state, slot, template).await;
    if let Err(e) = &result {
        log_error(state, e, json!({ "job": job }));
    }
    result
}

async fn post_content(
    state: &AppState,
    slot: ContentSlot,
    template: Template,
) -> Result<JobReport, BotError> {
    let job = template.name();
    let text = match slot {
        ContentSlot::Defi => state.completion.defi_update().await?,
        ContentSlot::Tip => state.completion.trading_tip().await?,
    };

    let last_key = CacheKey::LastContent(slot);
    let gate = SimilarityGate::new(state.settings.limits.content_similarity);
    let previous = state.cache.get_as::<String>(&last_key);
    if previous.is_some_and(|prev| gate.is_similar(&text, &prev)) {
        tracing::info!(job, "content too similar to last post");
        return Ok(JobReport::skipped(job, "similar_content"));
    }

    let tweet = state.social.post(template, &text).await?;
    state.cache.set_as(&last_key, &text, minutes(24 * 60));

    Ok(JobReport::completed(job)
        .with("tweet_id", tweet.id)
        .with("content", truncate(&text, 100)))
}
