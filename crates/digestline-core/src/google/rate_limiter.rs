//! Global rate limiter shared by every Google API call in a run

use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Requests-per-second budget; clones share the same bucket
#[derive(Clone)]
pub struct GlobalRateLimiter {
    limiter: Arc<DirectLimiter>,
}

impl GlobalRateLimiter {
    /// Zero falls back to 10 requests per second
    pub fn new(requests_per_second: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second)
            .or(NonZeroU32::new(10))
            .unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(rate))),
        }
    }

    /// Wait until a request is allowed
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

impl Default for GlobalRateLimiter {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_burst_is_bounded_and_shared_across_clones() {
        let limiter = GlobalRateLimiter::new(2);
        let clone = limiter.clone();
        let start = Instant::now();
        limiter.wait().await;
        clone.wait().await;
        assert!(start.elapsed() < Duration::from_millis(250));

        // the bucket is empty for both handles; the next cell frees up after 500ms
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(400));
    }
}
