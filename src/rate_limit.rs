use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;

// Admission decision for one request. Denial is a normal outcome, not an
// error - retry_after_minutes is only meaningful when allowed is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub retry_after_minutes: u64,
}

// Per-user sliding-window rate limiter.
//
// Each user gets an ordered window of accepted-request timestamps. check()
// purges expired entries and answers the admission question; record() appends
// unconditionally. The two are deliberately separate calls so a handler can
// check, validate the payload, and only consume quota on actual acceptance.
// Concurrent same-user calls can race between check and record - accepted
// trade, this is abuse mitigation rather than hard quota enforcement.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: DashMap<i64, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: DashMap::new(),
        }
    }

    // Can this user make a request right now?
    pub fn check(&self, user_id: i64) -> RateDecision {
        self.check_at(user_id, Instant::now())
    }

    // Consume one slot of the user's quota.
    pub fn record(&self, user_id: i64) {
        self.record_at(user_id, Instant::now());
    }

    fn check_at(&self, user_id: i64, now: Instant) -> RateDecision {
        // entry guard held for the whole purge + decision, so check, record
        // and purge serialize per user
        let mut window = self.windows.entry(user_id).or_default();

        // lazy purge - a timestamp exactly window-old is expired
        while let Some(&front) = window.front() {
            if now.duration_since(front) >= self.window {
                window.pop_front();
            } else {
                break;
            }
        }

        if (window.len() as u32) < self.max_requests {
            return RateDecision {
                allowed: true,
                retry_after_minutes: 0,
            };
        }

        // window full - the oldest entry decides when a slot frees up
        let wait = match window.front() {
            Some(&oldest) => (oldest + self.window).saturating_duration_since(now),
            // max_requests == 0: nothing ever frees up
            None => self.window,
        };
        RateDecision {
            allowed: false,
            retry_after_minutes: ceil_minutes(wait).max(1),
        }
    }

    fn record_at(&self, user_id: i64, now: Instant) {
        self.windows.entry(user_id).or_default().push_back(now);
    }
}

fn ceil_minutes(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.div_ceil(60)
}
