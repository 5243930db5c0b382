use serde::Serialize;
use std::fmt;

/// What to do with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Block,
    Allow,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Block => "block",
            Action::Allow => "allow",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which check produced a block. Allowed requests carry [`Reason::None`],
/// which serializes as the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Reason {
    #[serde(rename = "")]
    None,
    #[serde(rename = "known_bot_ua")]
    KnownBotUa,
    #[serde(rename = "known_bot_ip")]
    KnownBotIp,
    #[serde(rename = "rate_limit")]
    RateLimit,
    #[serde(rename = "header_anomaly")]
    HeaderAnomaly,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::None => "",
            Reason::KnownBotUa => "known_bot_ua",
            Reason::KnownBotIp => "known_bot_ip",
            Reason::RateLimit => "rate_limit",
            Reason::HeaderAnomaly => "header_anomaly",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the detection pipeline for one request.
///
/// `confidence` is a heuristic in `[0, 1]` for the fixed-score checks. For
/// header anomalies it is the raw summed weight and may exceed 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Decision {
    pub action: Action,
    pub reason: Reason,
    pub confidence: f64,
}

impl Decision {
    pub fn allow() -> Self {
        Self { action: Action::Allow, reason: Reason::None, confidence: 0.0 }
    }

    pub fn block(reason: Reason, confidence: f64) -> Self {
        Self { action: Action::Block, reason, confidence }
    }

    pub fn is_block(&self) -> bool {
        self.action == Action::Block
    }
}

impl Default for Decision {
    fn default() -> Self {
        Self::allow()
    }
}
