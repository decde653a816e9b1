//! Request spacing for the search provider.
//!
//! A single limiter is shared by every query of a run, so spacing holds even
//! when queries run on a worker pool.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Grants permission to issue the next request.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait until a request may be sent.
    async fn acquire(&self);
}

/// No spacing at all. Used by tests and by callers with their own throttling.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unthrottled;

#[async_trait]
impl RateLimiter for Unthrottled {
    async fn acquire(&self) {}
}

/// Spaces requests at least `interval` apart. The first request is not delayed.
#[derive(Debug)]
pub struct FixedInterval {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

#[async_trait]
impl RateLimiter for FixedInterval {
    async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(t) if t > now => t,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn unthrottled_never_waits() {
        let limiter = Unthrottled;
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn first_acquire_is_immediate() {
        let limiter = FixedInterval::from_millis(500);
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(250));
    }

    #[tokio::test]
    async fn fixed_interval_spaces_sequential_requests() {
        let limiter = FixedInterval::from_millis(30);
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        // Slots at 0, 30, 60 ms.
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn fixed_interval_spaces_concurrent_requests() {
        let limiter = Arc::new(FixedInterval::from_millis(25));
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.acquire().await })
            })
            .collect();
        for handle in handles {
            handle.await.expect("join");
        }

        assert!(start.elapsed() >= Duration::from_millis(75));
    }
}
