use regex::Regex;
use std::net::Ipv4Addr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{GuardError, Result};
use crate::fingerprinting::{IpRule, NormalizedHeaders};
use crate::rules::source::RuleSource;
use crate::rules::types::RuleSet;
use crate::telemetry::metrics::values;
use crate::telemetry::Metrics;

/// A rule set together with the matchers derived from it.
///
/// Always built completely before it is published, so readers never see a
/// rule set paired with caches from another version.
struct CompiledRules {
    rules: RuleSet,
    /// Lower-cased copy of `rules.blocked_uas`
    ua_lower: Vec<String>,
    /// Parsed `rules.blocked_ips`
    ip_rules: Vec<IpRule>,
    /// Parallel to `rules.header_patterns`; `None` for patterns that failed to compile
    header_res: Vec<Option<Regex>>,
}

impl CompiledRules {
    fn compile(rules: RuleSet) -> Self {
        let ua_lower = rules.blocked_uas.iter().map(|ua| ua.to_lowercase()).collect();
        let ip_rules = rules.blocked_ips.iter().map(|entry| IpRule::parse(entry)).collect();

        let header_res = rules
            .header_patterns
            .iter()
            .map(|hp| match Regex::new(&hp.pattern) {
                Ok(re) => Some(re),
                Err(source) => {
                    let err = GuardError::InvalidPattern { name: hp.name.clone(), source };
                    warn!(version = rules.version, error = %err, "Skipping header pattern");
                    None
                }
            })
            .collect();

        Self { rules, ua_lower, ip_rules, header_res }
    }
}

/// Holds the active rule set and keeps it fresh from a [`RuleSource`].
///
/// Matchers take the read side of one lock; publishing a new rule set takes
/// the write side once, after every derived structure has been built.
pub struct RuleManager {
    state: RwLock<CompiledRules>,
    metrics: Option<Arc<Metrics>>,
}

impl RuleManager {
    /// Create a manager with the built-in rules active.
    pub fn new(metrics: Option<Arc<Metrics>>) -> Self {
        Self::with_rules(RuleSet::builtin(), metrics)
    }

    pub fn with_rules(rules: RuleSet, metrics: Option<Arc<Metrics>>) -> Self {
        if let Some(m) = &metrics {
            m.record_rules_version(rules.version);
        }
        Self { state: RwLock::new(CompiledRules::compile(rules)), metrics }
    }

    /// Publish `rules` if its version is strictly greater than the active one.
    ///
    /// Returns whether the active rule set changed.
    pub fn apply(&self, rules: RuleSet) -> bool {
        let incoming = rules.version;
        if incoming <= self.version() {
            return false;
        }

        let compiled = CompiledRules::compile(rules);

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        // Re-check under the write lock: a concurrent apply may have won.
        let previous = state.rules.version;
        if incoming <= previous {
            return false;
        }
        *state = compiled;
        drop(state);

        info!(from = previous, to = incoming, "Rules updated");
        if let Some(m) = &self.metrics {
            m.record_rules_version(incoming);
        }
        true
    }

    /// Fetch once from `source` and apply the result.
    pub async fn sync_once(&self, source: &RuleSource) -> Result<bool> {
        let rules = source.fetch().await?;
        Ok(self.apply(rules))
    }

    /// Refresh loop: one fetch immediately, then one per `period`, until
    /// `cancel` fires. Fetch failures leave the active rules in place.
    /// Cancellation is observed between fetches, never during one.
    pub async fn run(
        self: Arc<Self>,
        source: RuleSource,
        period: Duration,
        cancel: CancellationToken,
    ) {
        info!(url = source.url(), period_secs = period.as_secs(), "Rule sync starting");

        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Rule sync received shutdown signal, exiting loop");
                    break;
                }
                _ = ticker.tick() => {
                    // A fetch already in flight runs to completion; the client
                    // timeout bounds how long shutdown waits for it.
                    let outcome = self.sync_once(&source).await;
                    self.record_sync(outcome);
                }
            }
        }
    }

    fn record_sync(&self, outcome: Result<bool>) {
        let result = match outcome {
            Ok(true) => values::SYNC_UPDATED,
            Ok(false) => values::SYNC_UNCHANGED,
            Err(e) => {
                debug!(error = %e, "Rule sync failed, keeping current rules");
                values::SYNC_FAILED
            }
        };
        if let Some(m) = &self.metrics {
            m.record_rule_sync(result);
        }
    }

    /// Case-insensitive substring match against every blocked user agent.
    pub fn is_blocked_ua(&self, ua: &str) -> bool {
        let lower = ua.to_lowercase();
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.ua_lower.iter().any(|pattern| lower.contains(pattern.as_str()))
    }

    pub fn is_blocked_ip(&self, ip: &str) -> bool {
        let parsed = ip.parse::<Ipv4Addr>().ok();
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.ip_rules.iter().any(|rule| rule.matches(ip, parsed))
    }

    /// Sum of the weights of every header pattern matching its header's value.
    /// Absent headers are matched as the empty string.
    pub fn header_anomaly_score(&self, headers: &NormalizedHeaders) -> f64 {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .rules
            .header_patterns
            .iter()
            .zip(state.header_res.iter())
            .filter_map(|(hp, re)| re.as_ref().map(|re| (hp, re)))
            .filter(|(hp, re)| re.is_match(headers.value_or_empty(&hp.name)))
            .map(|(hp, _)| hp.weight)
            .sum()
    }

    pub fn anomaly_threshold(&self) -> f64 {
        self.state.read().unwrap_or_else(PoisonError::into_inner).rules.anomaly_threshold
    }

    pub fn version(&self) -> u64 {
        self.state.read().unwrap_or_else(PoisonError::into_inner).rules.version
    }

    /// Copy of the active rule set.
    pub fn snapshot(&self) -> RuleSet {
        self.state.read().unwrap_or_else(PoisonError::into_inner).rules.clone()
    }
}
