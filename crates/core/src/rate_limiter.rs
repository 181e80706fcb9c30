//! A token-bucket rate limiter shared across sessions, one bucket per
//! transfer direction (spec §6).

use std::time::{Duration, Instant};

use crate::command::TransferDirection;

/// A single direction's token bucket. Tokens are bytes; the bucket fills
/// continuously at `bytes_per_sec` up to `burst` and is drained by
/// [`TokenBucket::try_consume`].
#[derive(Debug, Clone)]
struct TokenBucket {
    bytes_per_sec: Option<u64>,
    burst: u64,
    available: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(bytes_per_sec: Option<u64>, now: Instant) -> Self {
        let burst = bytes_per_sec.unwrap_or(0).max(1);
        Self {
            bytes_per_sec,
            burst,
            available: burst as f64,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let Some(rate) = self.bytes_per_sec else {
            return;
        };
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.available = (self.available + elapsed.as_secs_f64() * rate as f64)
            .min(self.burst as f64);
        self.last_refill = now;
    }

    /// Attempts to consume `bytes`. Returns `Ok(())` if granted, or
    /// `Err(wait)` with how long the caller should wait before retrying
    /// if the bucket is unlimited-but-empty is impossible (unlimited
    /// buckets always grant immediately).
    fn try_consume(&mut self, bytes: u64, now: Instant) -> Result<(), Duration> {
        let Some(rate) = self.bytes_per_sec else {
            return Ok(());
        };
        self.refill(now);
        if self.available >= bytes as f64 {
            self.available -= bytes as f64;
            Ok(())
        } else {
            let deficit = bytes as f64 - self.available;
            let wait_secs = deficit / rate.max(1) as f64;
            Err(Duration::from_secs_f64(wait_secs))
        }
    }

    fn set_rate(&mut self, bytes_per_sec: Option<u64>, now: Instant) {
        self.refill(now);
        self.bytes_per_sec = bytes_per_sec;
        if let Some(rate) = bytes_per_sec {
            self.burst = rate.max(1);
            self.available = self.available.min(self.burst as f64);
        }
    }
}

/// Rate limiter covering both transfer directions, shared by every active
/// session the way upstream's single process-wide speed limiter is.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    download: TokenBucket,
    upload: TokenBucket,
}

impl RateLimiter {
    pub fn new(
        download_bytes_per_sec: Option<u64>,
        upload_bytes_per_sec: Option<u64>,
        now: Instant,
    ) -> Self {
        Self {
            download: TokenBucket::new(download_bytes_per_sec, now),
            upload: TokenBucket::new(upload_bytes_per_sec, now),
        }
    }

    fn bucket_mut(&mut self, direction: TransferDirection) -> &mut TokenBucket {
        match direction {
            TransferDirection::Download => &mut self.download,
            TransferDirection::Upload => &mut self.upload,
        }
    }

    /// Attempts to consume `bytes` of transfer quota in `direction`.
    /// Returns `Err(wait)` when the caller should back off for `wait`
    /// before attempting the same amount again.
    pub fn try_consume(
        &mut self,
        direction: TransferDirection,
        bytes: u64,
        now: Instant,
    ) -> Result<(), Duration> {
        self.bucket_mut(direction).try_consume(bytes, now)
    }

    /// Reconfigures the limit for one direction without losing
    /// already-accumulated headroom beyond the new burst ceiling.
    pub fn set_rate(&mut self, direction: TransferDirection, bytes_per_sec: Option<u64>, now: Instant) {
        self.bucket_mut(direction).set_rate(bytes_per_sec, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_bucket_always_grants() {
        let mut limiter = RateLimiter::new(None, None, Instant::now());
        let now = Instant::now();
        assert!(limiter
            .try_consume(TransferDirection::Download, 1_000_000_000, now)
            .is_ok());
    }

    #[test]
    fn limited_bucket_rejects_past_burst_then_refills() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(Some(100), None, start);
        assert!(limiter
            .try_consume(TransferDirection::Download, 100, start)
            .is_ok());
        assert!(limiter
            .try_consume(TransferDirection::Download, 1, start)
            .is_err());
        let later = start + Duration::from_secs(1);
        assert!(limiter
            .try_consume(TransferDirection::Download, 50, later)
            .is_ok());
    }

    #[test]
    fn directions_are_independent() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(Some(10), Some(10), start);
        assert!(limiter
            .try_consume(TransferDirection::Download, 10, start)
            .is_ok());
        assert!(limiter
            .try_consume(TransferDirection::Upload, 10, start)
            .is_ok());
    }
}
