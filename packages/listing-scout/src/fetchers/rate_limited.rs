//! Rate-limited fetcher wrapper.
//!
//! Wraps any `PageFetcher` with a `governor` quota so concurrent extraction
//! stays polite to the marketplace hosts.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::FetchResult;
use crate::traits::fetcher::{FetchedPage, PageFetcher};

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A fetcher wrapper that waits for a permit before every fetch.
pub struct RateLimitedFetcher<F: PageFetcher> {
    inner: F,
    limiter: Arc<DirectRateLimiter>,
}

impl<F: PageFetcher> RateLimitedFetcher<F> {
    /// `requests_per_second` of 0 is treated as 1.
    pub fn new(fetcher: F, requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(nonzero!(1u32));
        Self::with_quota(fetcher, Quota::per_second(rps))
    }

    /// Sustained rate plus a burst allowance.
    pub fn with_burst(fetcher: F, requests_per_second: u32, burst: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(nonzero!(1u32));
        let burst = NonZeroU32::new(burst).unwrap_or(rps);
        Self::with_quota(fetcher, Quota::per_second(rps).allow_burst(burst))
    }

    pub fn with_quota(fetcher: F, quota: Quota) -> Self {
        Self {
            inner: fetcher,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F: PageFetcher> PageFetcher for RateLimitedFetcher<F> {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        self.limiter.until_ready().await;
        self.inner.fetch(url).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Extension trait for wrapping fetchers with rate limits.
pub trait RateLimitExt: PageFetcher + Sized {
    fn rate_limited(self, requests_per_second: u32) -> RateLimitedFetcher<Self> {
        RateLimitedFetcher::new(self, requests_per_second)
    }

    fn rate_limited_with_burst(
        self,
        requests_per_second: u32,
        burst: u32,
    ) -> RateLimitedFetcher<Self> {
        RateLimitedFetcher::with_burst(self, requests_per_second, burst)
    }
}

impl<F: PageFetcher + Sized> RateLimitExt for F {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPageFetcher;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_passes_through() {
        let fetcher = MockPageFetcher::new()
            .with_page("https://ikman.lk/en/ad/a-1", "<h1>A</h1>")
            .rate_limited(100);

        let page = fetcher.fetch("https://ikman.lk/en/ad/a-1").await.unwrap();
        assert_eq!(page.body, "<h1>A</h1>");
        assert_eq!(fetcher.inner().fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_limits_rate() {
        let fetcher = MockPageFetcher::new()
            .with_page("https://ikman.lk/en/ad/a-1", "<h1>A</h1>")
            .rate_limited_with_burst(10, 1);

        let start = Instant::now();
        for _ in 0..3 {
            fetcher.fetch("https://ikman.lk/en/ad/a-1").await.unwrap();
        }
        // Burst of 1 at 10/s: the 2nd and 3rd calls wait ~100ms each.
        assert!(start.elapsed() >= Duration::from_millis(150));
    }
}
