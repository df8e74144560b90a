use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use crate::metrics::{CACHE_HITS, CACHE_MISSES, CACHE_SIZE};

/// Every key the bot stores in the cache.
///
/// Keys render to the flat string namespace the stats endpoint reports,
/// so two features can only collide if they share a variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    MarketAnalysis,
    LastMarketAnalysis,
    DefiUpdate,
    LastContent(ContentSlot),
    LastDegenAlertTime,
    LastDegenAlertContent,
    LastMentionId,
    MaintenanceMode,
    MaintenanceReason,
    RecentErrors,
    JobStats(&'static str),
    GlobalInteractionStats,
    UserInteractions(String),
}

// Scheduled content kinds that remember their last post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentSlot {
    Defi,
    Tip,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::MarketAnalysis => f.write_str("market_analysis"),
            CacheKey::LastMarketAnalysis => f.write_str("last_market_analysis"),
            CacheKey::DefiUpdate => f.write_str("defi_update"),
            CacheKey::LastContent(ContentSlot::Defi) => f.write_str("last_defi_content"),
            CacheKey::LastContent(ContentSlot::Tip) => f.write_str("last_tip_content"),
            CacheKey::LastDegenAlertTime => f.write_str("last_degen_alert_time"),
            CacheKey::LastDegenAlertContent => f.write_str("last_degen_alert_content"),
            CacheKey::LastMentionId => f.write_str("last_mention_id"),
            CacheKey::MaintenanceMode => f.write_str("maintenance_mode"),
            CacheKey::MaintenanceReason => f.write_str("maintenance_reason"),
            CacheKey::RecentErrors => f.write_str("recent_errors"),
            CacheKey::JobStats(job) => write!(f, "{job}_stats"),
            CacheKey::GlobalInteractionStats => f.write_str("global_interaction_stats"),
            CacheKey::UserInteractions(handle) => write!(f, "user_interactions_{handle}"),
        }
    }
}

// Cache entry with creation and expiry timestamps
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheItemStats {
    pub key: String,
    pub age_minutes: u64,
    pub ttl_remaining_minutes: u64,
    pub expired: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_items: usize,
    pub items: Vec<CacheItemStats>,
}

/// Process-wide key/value store with per-entry time-to-live.
///
/// Expiry is lazy: `get` evicts an expired entry when it sees one, and
/// `sweep` drops everything expired so unread keys do not pile up.
#[derive(Debug, Default)]
pub struct Cache {
    entries: DashMap<String, CacheEntry>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    // Store a value, replacing whatever was under the key
    pub fn set(&self, key: &CacheKey, value: Value, ttl: Duration) {
        let now = Instant::now();
        // a zero ttl would break expires_at > created_at
        let ttl = ttl.max(Duration::from_millis(1));
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + ttl,
            },
        );
        CACHE_SIZE.set(self.entries.len() as f64);
        tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "cached value");
    }

    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let now = Instant::now();
        let name = key.to_string();

        // the read guard must be gone before remove_if takes the shard lock
        let lookup = self
            .entries
            .get(&name)
            .map(|entry| (!entry.is_expired(now)).then(|| entry.value.clone()));

        match lookup {
            Some(Some(value)) => {
                CACHE_HITS.inc();
                tracing::debug!(key = %name, "cache hit");
                Some(value)
            }
            Some(None) => {
                self.entries.remove_if(&name, |_, entry| entry.is_expired(now));
                CACHE_MISSES.inc();
                None
            }
            None => {
                CACHE_MISSES.inc();
                None
            }
        }
    }

    /// Typed read. A value that no longer deserializes into `T` is a miss.
    pub fn get_as<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cached value has unexpected shape");
                None
            }
        }
    }

    pub fn set_as<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        match serde_json::to_value(value) {
            Ok(json) => self.set(key, json, ttl),
            Err(e) => tracing::warn!(key = %key, error = %e, "value not cacheable"),
        }
    }

    pub fn delete(&self, key: &CacheKey) {
        self.entries.remove(&key.to_string());
        CACHE_SIZE.set(self.entries.len() as f64);
    }

    pub fn clear(&self) {
        self.entries.clear();
        CACHE_SIZE.set(0.0);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry, returning how many went.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::info!(removed, "swept expired cache entries");
        }
        CACHE_SIZE.set(self.entries.len() as f64);
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let mut items: Vec<CacheItemStats> = self
            .entries
            .iter()
            .map(|entry| CacheItemStats {
                key: entry.key().clone(),
                age_minutes: now.saturating_duration_since(entry.created_at).as_secs() / 60,
                ttl_remaining_minutes: entry.expires_at.saturating_duration_since(now).as_secs()
                    / 60,
                expired: entry.is_expired(now),
            })
            .collect();
        items.sort_by(|a, b| a.key.cmp(&b.key));

        CacheStats {
            total_items: items.len(),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::time::advance;

    fn minutes(n: u64) -> Duration {
        Duration::from_secs(n * 60)
    }

    #[tokio::test(start_paused = true)]
    async fn it_returns_value_until_ttl_passes() {
        let cache = Cache::new();
        cache.set(&CacheKey::MarketAnalysis, json!("BTC holding 60k"), minutes(30));

        assert_eq!(cache.get(&CacheKey::MarketAnalysis), Some(json!("BTC holding 60k")));

        // exactly at expiry the entry is still served
        advance(minutes(30)).await;
        assert!(cache.get(&CacheKey::MarketAnalysis).is_some());

        advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get(&CacheKey::MarketAnalysis), None);
        // the expired read evicted it
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn set_overwrites_wholesale() {
        let cache = Cache::new();
        cache.set(&CacheKey::LastMentionId, json!({"id": "1", "extra": true}), minutes(5));
        cache.set(&CacheKey::LastMentionId, json!({"id": "2"}), minutes(60));

        assert_eq!(cache.get(&CacheKey::LastMentionId), Some(json!({"id": "2"})));

        // the new ttl applies, not the old one
        advance(minutes(10)).await;
        assert!(cache.get(&CacheKey::LastMentionId).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_expired_entries() {
        let cache = Cache::new();
        cache.set(&CacheKey::MarketAnalysis, json!(1), minutes(1));
        cache.set(&CacheKey::DefiUpdate, json!(2), minutes(1));
        cache.set(&CacheKey::RecentErrors, json!([]), minutes(60));

        assert_eq!(cache.sweep(), 0);
        advance(minutes(2)).await;
        assert_eq!(cache.sweep(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&CacheKey::RecentErrors).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn stats_report_age_and_remaining_ttl() {
        let cache = Cache::new();
        cache.set(&CacheKey::UserInteractions("alice".into()), json!([]), minutes(60));
        cache.set(&CacheKey::MarketAnalysis, json!("x"), minutes(5));

        advance(minutes(10)).await;
        let stats = cache.stats();
        assert_eq!(stats.total_items, 2);

        let market = &stats.items[0];
        assert_eq!(market.key, "market_analysis");
        assert_eq!(market.age_minutes, 10);
        assert_eq!(market.ttl_remaining_minutes, 0);
        assert!(market.expired);

        let user = &stats.items[1];
        assert_eq!(user.key, "user_interactions_alice");
        assert_eq!(user.ttl_remaining_minutes, 50);
        assert!(!user.expired);

        // stats has no side effects
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn clear_is_idempotent() {
        let cache = Cache::new();
        cache.set(&CacheKey::MarketAnalysis, json!(1), minutes(1));
        cache.clear();
        assert!(cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn delete_removes_one_key() {
        let cache = Cache::new();
        cache.set(&CacheKey::MaintenanceMode, json!(true), minutes(1));
        cache.set(&CacheKey::MaintenanceReason, json!("upgrade"), minutes(1));
        cache.delete(&CacheKey::MaintenanceMode);
        assert_eq!(cache.get(&CacheKey::MaintenanceMode), None);
        assert_eq!(cache.get(&CacheKey::MaintenanceReason), Some(json!("upgrade")));
    }

    #[test]
    fn typed_access_round_trips_and_tolerates_shape_changes() {
        let cache = Cache::new();
        cache.set_as(&CacheKey::LastDegenAlertTime, &1_700_000_000_000_i64, minutes(1));
        assert_eq!(
            cache.get_as::<i64>(&CacheKey::LastDegenAlertTime),
            Some(1_700_000_000_000)
        );
        assert_eq!(cache.get_as::<Vec<String>>(&CacheKey::LastDegenAlertTime), None);
    }

    #[test]
    fn keys_render_into_flat_namespace() {
        assert_eq!(CacheKey::JobStats("degen_alert").to_string(), "degen_alert_stats");
        assert_eq!(
            CacheKey::LastContent(ContentSlot::Tip).to_string(),
            "last_tip_content"
        );
        assert_eq!(
            CacheKey::UserInteractions("bob_1".into()).to_string(),
            "user_interactions_bob_1"
        );
    }
}
