//! Per-key request counting.
//!
//! Keys are whatever the caller identifies clients by; the guard uses the
//! resolved client IP. Windows are fixed, not sliding: a key's counter
//! restarts when its window expires, and expired keys are swept on a coarse
//! timer ([`CLEANUP_INTERVAL`]) so memory stays bounded to active clients.

mod limiter;

pub use limiter::{RateLimitResult, RateLimiter, CLEANUP_INTERVAL};
