//! Token-bucket pacing shared by every caller of one ledger
//!
//! Tokens refill continuously at `rate` per second up to `burst`. A caller
//! that finds the bucket empty reserves the next token anyway (the balance
//! goes negative) and sleeps until it would have refilled, so waiters are
//! served in arrival order.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::{sleep, Instant};

const EPSILON: f64 = 1e-9;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    /// Tokens per second; 0 disables pacing
    rate: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            rate: f64::from(requests_per_second),
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(0, 1)
    }

    pub fn is_unlimited(&self) -> bool {
        self.rate <= 0.0
    }

    fn lock(&self) -> MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.burst);
        bucket.last_refill = now;
    }

    /// Wait for a token, reserving it immediately
    pub async fn acquire(&self) {
        if let Some(wait) = self.reserve() {
            sleep(wait).await;
        }
    }

    /// Take a token and return how long to wait before using it
    fn reserve(&self) -> Option<Duration> {
        if self.is_unlimited() {
            return None;
        }

        let mut bucket = self.lock();
        self.refill(&mut bucket);
        bucket.tokens -= 1.0;

        if bucket.tokens >= -EPSILON {
            None
        } else {
            Some(Duration::from_secs_f64(-bucket.tokens / self.rate))
        }
    }

    /// Take a token only if one is available right now
    pub fn try_acquire(&self) -> bool {
        if self.is_unlimited() {
            return true;
        }

        let mut bucket = self.lock();
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 - EPSILON {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available, negative when callers are queued
    pub fn available(&self) -> f64 {
        let mut bucket = self.lock();
        self.refill(&mut bucket);
        bucket.tokens
    }
}
