use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crawlguard_lib::security::{RateLimitResult, RateLimiter};

#[test]
fn concurrent_callers_share_one_window() {
    let limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(3600)));
    let allowed = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            let allowed = Arc::clone(&allowed);
            thread::spawn(move || {
                for _ in 0..50 {
                    if !limiter.is_exceeded("203.0.113.1") {
                        allowed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap_or_else(|_| panic!("worker panicked"));
    }
    assert_eq!(allowed.load(Ordering::Relaxed), 100);
}

#[tokio::test(start_paused = true)]
async fn window_resets_after_expiry() {
    let limiter = RateLimiter::new(60, Duration::from_secs(60));

    for i in 0..60 {
        assert!(!limiter.is_exceeded("k"), "request {i} should pass");
    }
    assert!(limiter.is_exceeded("k"));

    tokio::time::advance(Duration::from_secs(59)).await;
    assert!(limiter.is_exceeded("k"));

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(limiter.check("k"), RateLimitResult::Allowed { limit: 60, remaining: 59 });
}

#[tokio::test(start_paused = true)]
async fn cleanup_keeps_active_keys_only() {
    let limiter = RateLimiter::new(10, Duration::from_secs(30));
    limiter.check("old");

    tokio::time::advance(Duration::from_secs(20)).await;
    limiter.check("new");

    tokio::time::advance(Duration::from_secs(15)).await;
    assert_eq!(limiter.cleanup(), 1);
    assert_eq!(limiter.tracked_keys(), 1);
}
