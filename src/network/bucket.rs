//! Per-peer token-bucket rate limiting.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Error, Result};

/// A token bucket holding byte tokens.
///
/// Tokens accumulate at `rate` bytes per second and saturate at
/// `capacity`. [`TokenBucket::request`] hands out whatever is available
/// immediately; [`TokenBucket::require`] suspends until the full amount
/// has accumulated.
#[derive(Debug)]
pub struct TokenBucket {
    rate: Option<f64>,
    capacity: u64,
    available: f64,
    last_update: Instant,
}

impl Default for TokenBucket {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl TokenBucket {
    /// Bucket with no rate limit.
    pub fn unlimited() -> Self {
        Self { rate: None, capacity: 0, available: 0.0, last_update: Instant::now() }
    }

    /// Bucket generating `rate_bytes_per_sec` tokens up to `capacity`.
    pub fn limited(rate_bytes_per_sec: f64, capacity: u64) -> Self {
        let mut bucket = Self::unlimited();
        bucket.set(Some(rate_bytes_per_sec), capacity);
        bucket
    }

    /// Replaces the limit; `None` disables it.
    pub fn set(&mut self, rate_bytes_per_sec: Option<f64>, capacity: u64) {
        self.rate = rate_bytes_per_sec;
        self.capacity = capacity;
        self.available = 0.0;
        self.last_update = Instant::now();
    }

    /// The configured fill rate, `None` when unlimited.
    pub fn rate(&self) -> Option<f64> {
        self.rate
    }

    /// The burst capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Whether no limit is configured.
    pub fn is_unlimited(&self) -> bool {
        self.rate.is_none()
    }

    fn refill(&mut self) {
        let now = Instant::now();
        if let Some(rate) = self.rate {
            let grown = self.available + now.duration_since(self.last_update).as_secs_f64() * rate;
            self.available = grown.min(self.capacity as f64);
        }
        self.last_update = now;
    }

    /// Takes up to `requested` tokens without blocking, returning how
    /// many were granted. Always grants everything when unlimited.
    pub fn request(&mut self, requested: u64) -> u64 {
        if self.rate.is_none() {
            return requested;
        }
        self.refill();
        let granted = requested.min(self.available as u64);
        self.available -= granted as f64;
        granted
    }

    /// Suspends until `required` tokens are available, then takes them.
    pub async fn require(&mut self, required: u64) -> Result<()> {
        let Some(rate) = self.rate else {
            return Ok(());
        };
        if required > self.capacity {
            return Err(Error::Contract(format!(
                "required {required} tokens exceed bucket capacity {}",
                self.capacity
            )));
        }
        loop {
            self.refill();
            if self.available >= required as f64 {
                self.available -= required as f64;
                return Ok(());
            }
            let deficit = required as f64 - self.available;
            let wait = Duration::from_secs_f64((deficit / rate).max(1e-4));
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_grants_everything() {
        let mut bucket = TokenBucket::unlimited();
        assert_eq!(bucket.request(u64::MAX), u64::MAX);
        assert!(bucket.is_unlimited());
    }

    #[test]
    fn test_request_is_bounded_by_capacity() {
        let mut bucket = TokenBucket::limited(1e6, 1000);
        std::thread::sleep(Duration::from_millis(20));
        // after a refill the bucket saturates at its capacity
        assert_eq!(bucket.request(5000), 1000);
        // and an immediate second request finds nearly nothing
        assert!(bucket.request(1000) < 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_require_waits_for_tokens() {
        let mut bucket = TokenBucket::limited(1000.0, 500);
        let before = Instant::now();
        bucket.require(400).await.unwrap();
        // 400 tokens at 1000 tokens/s need ~0.4 s of virtual time
        let waited = before.elapsed();
        assert!(waited >= Duration::from_millis(390), "waited {waited:?}");
        assert!(waited < Duration::from_millis(600), "waited {waited:?}");
    }

    #[tokio::test]
    async fn test_require_rejects_over_capacity() {
        let mut bucket = TokenBucket::limited(1000.0, 10);
        assert!(matches!(bucket.require(11).await, Err(Error::Contract(_))));
    }
}
