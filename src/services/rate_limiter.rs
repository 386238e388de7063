// src/services/rate_limiter.rs
use std::{
    collections::{HashMap, VecDeque},
    fmt::Debug,
    sync::Arc,
    time::Duration,
};

use tokio::{sync::Mutex, time::Instant};

use crate::config::RateLimitConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: usize },
    Limited { retry_after: Duration },
}

/// Sliding-window request log keyed by client.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    config: RateLimitConfig,
}

impl Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.config.max_requests)
            .field("window", &self.config.window)
            .finish()
    }
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    pub fn max_requests(&self) -> usize {
        self.config.max_requests
    }

    pub fn window(&self) -> Duration {
        self.config.window
    }

    /// Records a request for `key` unless the window is already full.
    /// Rejected requests are not recorded.
    pub async fn check(&self, key: &str) -> Decision {
        let now = Instant::now();
        let mut guard = self.inner.lock().await;
        let log = guard.entry(key.to_string()).or_default();

        while log
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.config.window)
        {
            log.pop_front();
        }

        if log.len() >= self.config.max_requests {
            let retry_after = log
                .front()
                .map(|oldest| self.config.window - now.duration_since(*oldest))
                .unwrap_or(self.config.window);
            return Decision::Limited { retry_after };
        }

        log.push_back(now);
        Decision::Allowed {
            remaining: self.config.max_requests - log.len(),
        }
    }

    /// Drop clients with no requests inside the window. Returns number removed.
    pub async fn purge_idle(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.inner.lock().await;
        let before = guard.len();
        guard.retain(|_, log| {
            log.back()
                .is_some_and(|t| now.duration_since(*t) < self.config.window)
        });
        before - guard.len()
    }

    /// Number of tracked clients
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: usize, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(window_secs),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides() {
        let limiter = limiter(2, 10);
        assert_eq!(limiter.check("a").await, Decision::Allowed { remaining: 1 });
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(limiter.check("a").await, Decision::Allowed { remaining: 0 });
        assert_eq!(
            limiter.check("a").await,
            Decision::Limited {
                retry_after: Duration::from_secs(6)
            }
        );

        // First request ages out, second is still inside the window.
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(limiter.check("a").await, Decision::Allowed { remaining: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn clients_are_independent() {
        let limiter = limiter(1, 60);
        assert!(matches!(limiter.check("a").await, Decision::Allowed { .. }));
        assert!(matches!(limiter.check("a").await, Decision::Limited { .. }));
        assert!(matches!(limiter.check("b").await, Decision::Allowed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_idle_clients() {
        let limiter = limiter(5, 10);
        limiter.check("a").await;
        tokio::time::advance(Duration::from_secs(5)).await;
        limiter.check("b").await;
        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(limiter.purge_idle().await, 1);
        assert_eq!(limiter.len().await, 1);
    }
}
