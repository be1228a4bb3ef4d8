// tests/rate_limiter_tests.rs

use std::time::Duration;
use stockflow::{Quota, RateLimiter};
use tokio::time::Instant;

#[tokio::test]
async fn test_call_beyond_quota_waits_for_window() {
    let window = Duration::from_millis(300);
    let limiter = RateLimiter::new().with_quota("alpha", Quota::new(2, window).unwrap());

    let start = Instant::now();
    limiter.acquire("alpha").await;
    limiter.acquire("alpha").await;
    assert!(start.elapsed() < window, "first max_calls acquisitions should not wait");

    limiter.acquire("alpha").await;
    assert!(start.elapsed() >= window);
}

#[tokio::test]
async fn test_sources_are_limited_independently() {
    let window = Duration::from_millis(500);
    let limiter = RateLimiter::new()
        .with_quota("alpha", Quota::new(1, window).unwrap())
        .with_quota("fmp", Quota::new(1, window).unwrap());

    let start = Instant::now();
    limiter.acquire("alpha").await;
    limiter.acquire("fmp").await;
    limiter.acquire("unregistered").await;
    limiter.acquire("unregistered").await;

    assert!(start.elapsed() < window);
}

#[tokio::test]
async fn test_quota_can_be_registered_on_shared_limiter() {
    let window = Duration::from_millis(200);
    let limiter = RateLimiter::new();
    limiter.set_quota("fmp", Quota::new(1, window).unwrap()).await;

    let start = Instant::now();
    limiter.acquire("fmp").await;
    limiter.acquire("fmp").await;

    assert!(start.elapsed() >= window);
}
