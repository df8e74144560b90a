use std::sync::Arc;
use tokio::time::Instant;

use crate::cache::Cache;
use crate::completion::CompletionClient;
use crate::config::Settings;
use crate::error::BotError;
use crate::quota::QuotaTracker;
use crate::rate_limit::{ReplyLedger, UserCooldown};
use crate::social::SocialClient;

// app's shared state; owns every policy singleton for the process lifetime
#[derive(Debug)]
pub struct AppState {
    pub settings: Settings,
    pub cache: Arc<Cache>,
    pub quota: Arc<QuotaTracker>,
    pub cooldown: Arc<UserCooldown>,
    pub ledger: Arc<ReplyLedger>,
    pub completion: CompletionClient,
    pub social: SocialClient,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self, BotError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("kinetic-bot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let limits = &settings.limits;
        let cache = Arc::new(Cache::new());
        let quota = Arc::new(QuotaTracker::with_cycles(
            limits.max_calls_per_cycle,
            limits.cycles_per_day,
        ));
        let cooldown = Arc::new(UserCooldown::new(
            limits.reply_cooldown_max,
            limits.reply_cooldown_window,
        ));
        let ledger = Arc::new(ReplyLedger::new(limits.replied_ledger_capacity));

        let completion = CompletionClient::new(
            http.clone(),
            settings.completion.clone(),
            Arc::clone(&cache),
            Arc::clone(&quota),
            Arc::clone(&cooldown),
        );
        let social = SocialClient::new(
            http,
            settings.social.clone(),
            limits.tweet_max_len,
            limits.max_posts_per_hour,
            Arc::clone(&ledger),
            Arc::clone(&cache),
        );

        Ok(Self {
            settings,
            cache,
            quota,
            cooldown,
            ledger,
            completion,
            social,
            started_at: Instant::now(),
        })
    }
}
