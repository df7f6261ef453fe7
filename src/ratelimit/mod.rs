//! Shared request-budget tracking for the CourtListener API
//!
//! CourtListener enforces an hourly request quota per token. This module
//! keeps a windowed counter that every API call records into, and exposes
//! usage stats so callers can pace themselves. Nothing here queues or
//! blocks: the limiter is advisory, and the orchestrator decides when to
//! sleep.
//!
//! The limiter is an explicit shared object handed to every call site via
//! `Arc` rather than ambient static state, so tests can inject a fake clock
//! and the orchestrator can inject a fake limiter.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

/// Utilization fraction at which the first advisory warning fires
const WARN_THRESHOLD: f64 = 0.70;
/// Utilization fraction at which the second, louder warning fires
const CRITICAL_THRESHOLD: f64 = 0.90;

/// Snapshot of quota consumption within the current window
#[derive(Debug, Clone, PartialEq)]
pub struct UsageStats {
    pub total_requests: u32,
    pub limit: u32,
    pub remaining: u32,
    pub utilization_percent: f64,
    pub window_end: DateTime<Utc>,
}

struct WindowState {
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    count: u32,
    warned_high: bool,
    warned_critical: bool,
}

/// Windowed request counter with a fixed reset interval
pub struct RateLimiter {
    limit: u32,
    window: chrono::Duration,
    state: Mutex<WindowState>,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl RateLimiter {
    /// Create a limiter with the given quota and window length
    pub fn new(limit: u32, window_secs: u64) -> Self {
        Self::with_clock(limit, window_secs, Arc::new(Utc::now))
    }

    /// Create a limiter with an injected clock (tests control time)
    pub fn with_clock(
        limit: u32,
        window_secs: u64,
        clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    ) -> Self {
        let window = chrono::Duration::seconds(window_secs as i64);
        let now = clock();
        Self {
            limit,
            window,
            state: Mutex::new(WindowState {
                window_start: now,
                window_end: now + window,
                count: 0,
                warned_high: false,
                warned_critical: false,
            }),
            clock,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WindowState> {
        // A poisoned lock only means a panicking thread held the counter;
        // the count itself is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Roll the window forward if its end has passed
    fn roll_if_expired(&self, state: &mut WindowState, now: DateTime<Utc>) {
        if now >= state.window_end {
            state.window_start = now;
            state.window_end = now + self.window;
            state.count = 0;
            state.warned_high = false;
            state.warned_critical = false;
        }
    }

    /// Record one request against the current window
    pub fn record_request(&self) {
        let now = (self.clock)();
        let mut state = self.lock();
        self.roll_if_expired(&mut state, now);
        state.count = state.count.saturating_add(1);
    }

    /// Snapshot current window usage
    pub fn usage_stats(&self) -> UsageStats {
        let now = (self.clock)();
        let mut state = self.lock();
        self.roll_if_expired(&mut state, now);

        let remaining = self.limit.saturating_sub(state.count);
        UsageStats {
            total_requests: state.count,
            limit: self.limit,
            remaining,
            utilization_percent: 100.0 * f64::from(state.count) / f64::from(self.limit),
            window_end: state.window_end,
        }
    }

    /// Log advisory warnings when utilization crosses 70% / 90%
    ///
    /// Fires at most once per threshold per window. Advisory only: sync
    /// continues regardless.
    pub fn warn_if_pressured(&self) {
        let now = (self.clock)();
        let mut state = self.lock();
        self.roll_if_expired(&mut state, now);

        let utilization = f64::from(state.count) / f64::from(self.limit);
        if utilization >= CRITICAL_THRESHOLD && !state.warned_critical {
            state.warned_critical = true;
            warn!(
                requests = state.count,
                limit = self.limit,
                window_end = %state.window_end,
                "API quota above 90%, sync may exhaust the window"
            );
        } else if utilization >= WARN_THRESHOLD && !state.warned_high {
            state.warned_high = true;
            warn!(
                requests = state.count,
                limit = self.limit,
                window_end = %state.window_end,
                "API quota above 70%"
            );
        }
    }

    /// Inter-run delay derived from actual quota pressure
    ///
    /// Returns `base` while the window is comfortable, stretches it as the
    /// quota drains, and waits out the window once the quota is exhausted.
    pub fn suggested_delay(&self, base: Duration) -> Duration {
        let stats = self.usage_stats();
        let now = (self.clock)();

        if stats.remaining == 0 {
            let to_reset = (stats.window_end - now).to_std().unwrap_or(Duration::ZERO);
            return to_reset.max(base);
        }

        let utilization = f64::from(stats.total_requests) / f64::from(stats.limit);
        if utilization <= WARN_THRESHOLD {
            return base;
        }

        // Linear stretch from 1x at 70% to 5x at 100%.
        let factor = 1.0 + (utilization - WARN_THRESHOLD) / (1.0 - WARN_THRESHOLD) * 4.0;
        base.mul_f64(factor)
    }
}
