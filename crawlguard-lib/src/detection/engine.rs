use std::sync::Arc;

use crate::detection::decision::{Decision, Reason};
use crate::fingerprinting::RequestView;
use crate::rules::RuleManager;
use crate::security::RateLimiter;

pub const CONFIDENCE_KNOWN_UA: f64 = 0.95;
pub const CONFIDENCE_KNOWN_IP: f64 = 0.90;
pub const CONFIDENCE_RATE_LIMIT: f64 = 0.70;

/// Ordered, short-circuiting detection pipeline.
///
/// Checks run cheapest first: user agent, IP, rate limit, header anomaly.
/// The rate limiter is consulted before header scoring, so a request blocked
/// by the UA or IP checks is never counted against its client's window.
#[derive(Clone)]
pub struct Detector {
    rules: Arc<RuleManager>,
    limiter: Arc<RateLimiter>,
}

impl Detector {
    pub fn new(rules: Arc<RuleManager>, limiter: Arc<RateLimiter>) -> Self {
        Self { rules, limiter }
    }

    pub fn rules(&self) -> &Arc<RuleManager> {
        &self.rules
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn analyze(&self, req: &RequestView) -> Decision {
        if self.rules.is_blocked_ua(&req.user_agent) {
            return Decision::block(Reason::KnownBotUa, CONFIDENCE_KNOWN_UA);
        }
        if self.rules.is_blocked_ip(&req.ip) {
            return Decision::block(Reason::KnownBotIp, CONFIDENCE_KNOWN_IP);
        }
        if self.limiter.is_exceeded(&req.ip) {
            return Decision::block(Reason::RateLimit, CONFIDENCE_RATE_LIMIT);
        }

        let score = self.rules.header_anomaly_score(&req.headers);
        if score > self.rules.anomaly_threshold() {
            return Decision::block(Reason::HeaderAnomaly, score);
        }

        Decision::allow()
    }
}
