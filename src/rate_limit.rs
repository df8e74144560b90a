use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

// Request timestamps for one limiter key
#[derive(Debug, Default)]
pub struct RateWindow {
    // longest window any caller has checked this key with
    longest: Duration,
    stamps: VecDeque<Instant>,
}

impl RateWindow {
    // Drop stamps that fell out of the trailing window
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.stamps.front() {
            if now.saturating_duration_since(*oldest) < window {
                break;
            }
            self.stamps.pop_front();
        }
    }
}

/// Sliding-window limiter keyed by caller-chosen names.
///
/// Each key is an independent window. `check_and_record` holds the key's
/// shard lock for the whole check so two callers can never both take the
/// last slot.
#[derive(Debug, Default)]
pub struct SlidingWindowLimiter {
    windows: DashMap<String, RateWindow>,
}

impl SlidingWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_and_record(&self, key: &str, max_requests: usize, window: Duration) -> bool {
        let now = Instant::now();
        let mut state = self.windows.entry(key.to_owned()).or_default();
        state.longest = state.longest.max(window);
        state.prune(now, window);

        if state.stamps.len() < max_requests {
            state.stamps.push_back(now);
            true
        } else {
            tracing::debug!(key, max_requests, "rate limit reached");
            false
        }
    }

    // Forget keys whose windows have emptied out. Pruning uses the longest
    // window seen per key so no caller loses stamps it still counts.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, state| {
            let longest = state.longest;
            state.prune(now, longest);
            !state.stamps.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

/// Per-user interaction cooldown: at most `max` interactions per `window`.
#[derive(Debug)]
pub struct UserCooldown {
    limiter: SlidingWindowLimiter,
    max: usize,
    window: Duration,
}

impl UserCooldown {
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            limiter: SlidingWindowLimiter::new(),
            max,
            window,
        }
    }

    pub fn try_interact(&self, handle: &str) -> bool {
        let key = format!("user_{}", handle.to_ascii_lowercase());
        self.limiter.check_and_record(&key, self.max, self.window)
    }

    pub fn sweep(&self) -> usize {
        self.limiter.sweep()
    }
}

/// Bounded record of tweets already replied to, oldest evicted first.
#[derive(Debug)]
pub struct ReplyLedger {
    capacity: usize,
    replied: Mutex<VecDeque<String>>,
}

impl ReplyLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            replied: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn contains(&self, tweet_id: &str) -> bool {
        let replied = self.replied.lock().unwrap_or_else(PoisonError::into_inner);
        replied.iter().any(|id| id == tweet_id)
    }

    /// Claim a tweet for replying. Returns false when it was already claimed.
    pub fn claim(&self, tweet_id: &str) -> bool {
        let mut replied = self.replied.lock().unwrap_or_else(PoisonError::into_inner);
        if replied.iter().any(|id| id == tweet_id) {
            return false;
        }
        replied.push_back(tweet_id.to_owned());
        while replied.len() > self.capacity {
            replied.pop_front();
        }
        true
    }

    // Undo a claim whose reply never went out
    pub fn release(&self, tweet_id: &str) {
        let mut replied = self.replied.lock().unwrap_or_else(PoisonError::into_inner);
        replied.retain(|id| id != tweet_id);
    }

    pub fn len(&self) -> usize {
        self.replied.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
