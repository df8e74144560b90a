use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior, interval};

use crate::cache::Cache;
use crate::rate_limit::UserCooldown;

/// Periodically drop expired cache entries and idle limiter windows so
/// keys nobody reads again do not pile up.
pub async fn sweeper(cache: Arc<Cache>, cooldown: Arc<UserCooldown>, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(interval = ?every, "sweeper started");

    loop {
        ticker.tick().await;
        sweep_once(&cache, &cooldown);
    }
}

pub fn sweep_once(cache: &Cache, cooldown: &UserCooldown) -> (usize, usize) {
    let entries = cache.sweep();
    let windows = cooldown.sweep();
    if entries > 0 || windows > 0 {
        tracing::debug!(entries, windows, remaining = cache.len(), "swept expired state");
    }
    (entries, windows)
}
