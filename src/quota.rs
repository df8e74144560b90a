use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::metrics::{EMERGENCY_MODE, QUOTA_DAILY_USED};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const HOUR: Duration = Duration::from_secs(60 * 60);

// Counters behind the tracker's lock
#[derive(Debug)]
struct QuotaState {
    daily_count: u32,
    hourly_count: u32,
    day_started: Instant,
    hour_started: Instant,
    emergency_mode: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuotaStats {
    pub daily_count: u32,
    pub hourly_count: u32,
    pub daily_ceiling: u32,
    pub emergency_mode: bool,
    pub last_daily_reset: DateTime<Utc>,
    pub last_hourly_reset: DateTime<Utc>,
}

/// Daily budget for upstream AI calls.
///
/// Usage is charged on attempt, not on success. Once the ceiling is hit or
/// the provider throttles us the tracker stays in emergency mode until the
/// next daily reset. Daily and hourly counters reset from separate
/// checkpoints so an hourly reset never moves the daily clock.
#[derive(Debug)]
pub struct QuotaTracker {
    ceiling: u32,
    state: Mutex<QuotaState>,
}

impl QuotaTracker {
    pub fn new(ceiling: u32) -> Self {
        let now = Instant::now();
        Self {
            ceiling,
            state: Mutex::new(QuotaState {
                daily_count: 0,
                hourly_count: 0,
                day_started: now,
                hour_started: now,
                emergency_mode: false,
            }),
        }
    }

    // max calls per cycle x cycles per day
    pub fn with_cycles(max_per_cycle: u32, cycles_per_day: u32) -> Self {
        Self::new(max_per_cycle.saturating_mul(cycles_per_day))
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    fn lock(&self) -> MutexGuard<'_, QuotaState> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Self::reset_due(&mut state, Instant::now());
        state
    }

    fn reset_due(state: &mut QuotaState, now: Instant) {
        if now.saturating_duration_since(state.day_started) >= DAY {
            tracing::info!(
                daily_count = state.daily_count,
                emergency_mode = state.emergency_mode,
                "daily quota reset"
            );
            state.daily_count = 0;
            state.emergency_mode = false;
            state.day_started = now;
            QUOTA_DAILY_USED.set(0.0);
            EMERGENCY_MODE.set(0.0);
        }
        if now.saturating_duration_since(state.hour_started) >= HOUR {
            state.hourly_count = 0;
            state.hour_started = now;
        }
    }

    pub fn reset_if_due(&self) {
        drop(self.lock());
    }

    pub fn can_proceed(&self) -> bool {
        let state = self.lock();
        !state.emergency_mode && state.daily_count < self.ceiling
    }

    // Charge one attempted call
    pub fn record(&self) {
        let mut state = self.lock();
        Self::charge(&mut state);
    }

    /// `can_proceed` and `record` under one lock.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.lock();
        if state.emergency_mode || state.daily_count >= self.ceiling {
            return false;
        }
        Self::charge(&mut state);
        true
    }

    fn charge(state: &mut QuotaState) {
        state.daily_count = state.daily_count.saturating_add(1);
        state.hourly_count = state.hourly_count.saturating_add(1);
        QUOTA_DAILY_USED.set(f64::from(state.daily_count));
    }

    pub fn enter_emergency_mode(&self) {
        let mut state = self.lock();
        if !state.emergency_mode {
            tracing::warn!(daily_count = state.daily_count, "entering emergency mode");
        }
        state.emergency_mode = true;
        EMERGENCY_MODE.set(1.0);
    }

    pub fn is_emergency(&self) -> bool {
        self.lock().emergency_mode
    }

    pub fn stats(&self) -> QuotaStats {
        let state = self.lock();
        let now = Instant::now();
        QuotaStats {
            daily_count: state.daily_count,
            hourly_count: state.hourly_count,
            daily_ceiling: self.ceiling,
            emergency_mode: state.emergency_mode,
            last_daily_reset: wall_clock(now, state.day_started),
            last_hourly_reset: wall_clock(now, state.hour_started),
        }
    }
}

// Map a monotonic checkpoint onto wall-clock time for reporting
pub(crate) fn wall_clock(now: Instant, then: Instant) -> DateTime<Utc> {
    let ago = chrono::Duration::from_std(now.saturating_duration_since(then))
        .unwrap_or_else(|_| chrono::Duration::zero());
    Utc::now() - ago
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn ceiling_blocks_until_daily_reset() {
        let quota = QuotaTracker::with_cycles(20, 4);
        assert_eq!(quota.ceiling(), 80);

        for _ in 0..80 {
            assert!(quota.can_proceed());
            quota.record();
        }
        assert!(!quota.can_proceed());
        assert!(!quota.try_acquire());

        advance(DAY + Duration::from_secs(1)).await;
        quota.reset_if_due();
        let stats = quota.stats();
        assert_eq!(stats.daily_count, 0);
        assert!(!stats.emergency_mode);
        assert!(quota.can_proceed());
    }

    #[tokio::test(start_paused = true)]
    async fn emergency_mode_holds_until_the_next_day() {
        let quota = QuotaTracker::new(10);
        quota.record();
        quota.enter_emergency_mode();
        assert!(!quota.can_proceed());

        // hourly resets leave it in place
        advance(HOUR * 5).await;
        assert!(quota.is_emergency());
        assert_eq!(quota.stats().hourly_count, 0);
        assert_eq!(quota.stats().daily_count, 1);

        advance(HOUR * 19).await;
        assert!(!quota.is_emergency());
        assert!(quota.can_proceed());
    }

    #[tokio::test(start_paused = true)]
    async fn hourly_and_daily_checkpoints_are_independent() {
        let quota = QuotaTracker::new(100);
        quota.record();

        advance(Duration::from_secs(90 * 60)).await;
        quota.record();
        let stats = quota.stats();
        // hour rolled over before the second call
        assert_eq!(stats.hourly_count, 1);
        assert_eq!(stats.daily_count, 2);

        // 24h after start the daily counter clears even though the hour
        // checkpoint moved at 90 minutes
        advance(DAY - Duration::from_secs(90 * 60)).await;
        assert_eq!(quota.stats().daily_count, 0);
    }

    #[test]
    fn try_acquire_is_atomic_under_contention() {
        let quota = Arc::new(QuotaTracker::new(25));
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let quota = Arc::clone(&quota);
                std::thread::spawn(move || quota.try_acquire())
            })
            .collect();

        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|granted| *granted)
            .count();
        assert_eq!(granted, 25);
        assert_eq!(quota.stats().daily_count, 25);
    }

    #[test]
    fn record_counts_even_past_the_ceiling() {
        let quota = QuotaTracker::new(1);
        quota.record();
        quota.record();
        assert_eq!(quota.stats().daily_count, 2);
        assert!(!quota.can_proceed());
    }
}
