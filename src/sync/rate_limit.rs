// Rate Limiting - token bucket for outgoing ledger status updates
//
// A send that finds the bucket empty is skipped, never queued.

use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct RateLimiter {
    permits_per_sec: f64,
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Bucket refilling at `permits_per_sec`, holding at most one second's worth
    pub fn new(permits_per_sec: u32) -> Self {
        Self::new_at(permits_per_sec, Instant::now())
    }

    pub fn new_at(permits_per_sec: u32, now: Instant) -> Self {
        let rate = f64::from(permits_per_sec.max(1));
        Self {
            permits_per_sec: rate,
            capacity: rate,
            tokens: rate,
            last_refill: now,
        }
    }

    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// Take one token if available at `now`
    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed > Duration::ZERO {
            self.tokens =
                (self.tokens + elapsed.as_secs_f64() * self.permits_per_sec).min(self.capacity);
            self.last_refill = now;
        }
    }
}
