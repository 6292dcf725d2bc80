// Per-user sliding-window request throttle, independent of the daily quota
use crate::config::BotConfig;
use crate::types::UserId;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::warn;

/// In-memory sliding window limiter.
///
/// Each user's window lives in its own map entry; the entry guard makes the
/// prune-check-record sequence atomic for that user, so two concurrent
/// requests can never both take the last free slot. Windows are never
/// persisted and are lost on restart; windows that slide empty are dropped
/// by `prune_idle`.
pub struct RateLimiter {
    windows: DashMap<UserId, VecDeque<Instant>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(config.rate_limit_per_minute, config.rate_limit_window)
    }

    /// Admit and record one request for `user_id` now
    pub fn check_rate_limit(&self, user_id: UserId) -> bool {
        self.check_rate_limit_at(user_id, Instant::now())
    }

    /// Admit and record one request observed at `now`
    pub fn check_rate_limit_at(&self, user_id: UserId, now: Instant) -> bool {
        let mut window = self.windows.entry(user_id).or_default();

        while let Some(&oldest) = window.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() >= self.max_requests {
            warn!(target = "rate_limit", user_id = %user_id, "Rate limit exceeded");
            return false;
        }

        window.push_back(now);
        true
    }

    /// Drop users whose window has fully slid past; returns how many
    pub fn prune_idle(&self) -> usize {
        self.prune_idle_at(Instant::now())
    }

    pub fn prune_idle_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            window.retain(|&at| now.saturating_duration_since(at) < self.window);
            !window.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    /// Requests currently counted against `user_id`
    pub fn in_window(&self, user_id: UserId) -> usize {
        self.windows.get(&user_id).map(|w| w.len()).unwrap_or(0)
    }

    pub fn tracked_users(&self) -> usize {
        self.windows.len()
    }
}
