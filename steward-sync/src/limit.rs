//! Token-bucket rate limiter for host API calls.
//!
//! One token is refilled per `refill_every` interval, up to `capacity`.
//! `acquire` suspends the calling task until a token is available, so burst
//! pressure from the worker pool degrades into a steady request rate instead
//! of hammering the host.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

/// Async token bucket shared across the worker pool.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    refill_every: Duration,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// A bucket that starts full.
    pub fn new(capacity: u32, refill_every: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            refill_every,
            bucket: Mutex::new(Bucket {
                tokens: capacity.max(1),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token, waiting for a refill when the bucket is empty.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                self.refill(&mut bucket);
                if bucket.tokens > 0 {
                    bucket.tokens -= 1;
                    return;
                }
                self.refill_every
                    .saturating_sub(bucket.last_refill.elapsed())
            };
            tokio::time::sleep(wait).await;
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        if self.refill_every.is_zero() {
            bucket.tokens = self.capacity;
            return;
        }
        let elapsed = bucket.last_refill.elapsed();
        let earned = (elapsed.as_nanos() / self.refill_every.as_nanos()) as u32;
        if earned > 0 {
            bucket.tokens = (bucket.tokens + earned).min(self.capacity);
            bucket.last_refill += self.refill_every * earned;
        }
    }
}
