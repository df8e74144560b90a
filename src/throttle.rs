use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::quota::wall_clock;

const HOUR: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
struct ThrottleState {
    hourly_count: u32,
    last_reset: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThrottleStats {
    pub posts_this_hour: u32,
    pub max_posts_per_hour: u32,
    pub can_post: bool,
    pub last_reset: DateTime<Utc>,
}

/// Outbound post counter for a single social client.
///
/// `can_post` is advisory; `record_post` never refuses. Use `try_record`
/// when several tasks share one client.
#[derive(Debug)]
pub struct PostThrottle {
    max_per_hour: u32,
    state: Mutex<ThrottleState>,
}

impl PostThrottle {
    pub fn new(max_per_hour: u32) -> Self {
        Self {
            max_per_hour,
            state: Mutex::new(ThrottleState {
                hourly_count: 0,
                last_reset: Instant::now(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ThrottleState> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if now.saturating_duration_since(state.last_reset) >= HOUR {
            tracing::debug!(posts = state.hourly_count, "post counter reset");
            state.hourly_count = 0;
            state.last_reset = now;
        }
        state
    }

    pub fn reset_if_due(&self) {
        drop(self.lock());
    }

    pub fn can_post(&self) -> bool {
        self.lock().hourly_count < self.max_per_hour
    }

    pub fn record_post(&self) {
        let mut state = self.lock();
        state.hourly_count = state.hourly_count.saturating_add(1);
        tracing::info!(
            posts = state.hourly_count,
            max = self.max_per_hour,
            "posts this hour"
        );
    }

    // can_post + record_post in one critical section
    pub fn try_record(&self) -> bool {
        let mut state = self.lock();
        if state.hourly_count >= self.max_per_hour {
            return false;
        }
        state.hourly_count += 1;
        true
    }

    pub fn stats(&self) -> ThrottleStats {
        let state = self.lock();
        ThrottleStats {
            posts_this_hour: state.hourly_count,
            max_posts_per_hour: self.max_per_hour,
            can_post: state.hourly_count < self.max_per_hour,
            last_reset: wall_clock(Instant::now(), state.last_reset),
        }
    }
}
