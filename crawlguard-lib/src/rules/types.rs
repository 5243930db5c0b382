use serde::{Deserialize, Serialize};

/// A weighted regular expression applied to one request header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderPattern {
    /// Lower-cased header name
    #[serde(default)]
    pub name: String,
    /// Regular expression matched against the header value (empty if absent)
    #[serde(default)]
    pub pattern: String,
    /// Score added when the pattern matches
    #[serde(default)]
    pub weight: f64,
}

impl HeaderPattern {
    pub fn new(name: &str, pattern: &str, weight: f64) -> Self {
        Self { name: name.to_string(), pattern: pattern.to_string(), weight }
    }
}

/// Versioned bundle of detection rules.
///
/// The JSON shape is the one served by `GET /v1/rules`. Missing fields
/// deserialize to their empty value, so a body without `version` is never
/// newer than the active set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub version: u64,
    #[serde(default, rename = "updatedAt")]
    pub updated_at: String,
    /// Case-insensitive user-agent substrings
    #[serde(default, rename = "blockedUAs")]
    pub blocked_uas: Vec<String>,
    /// IPv4 CIDR blocks or exact addresses
    #[serde(default, rename = "blockedIPs")]
    pub blocked_ips: Vec<String>,
    #[serde(default, rename = "headerPatterns")]
    pub header_patterns: Vec<HeaderPattern>,
    /// Scores strictly above this block the request
    #[serde(default, rename = "anomalyThreshold")]
    pub anomaly_threshold: f64,
}

const DEFAULT_BLOCKED_UAS: &[&str] = &[
    "GPTBot",
    "ChatGPT-User",
    "OAI-SearchBot",
    "CCBot",
    "anthropic-ai",
    "ClaudeBot",
    "Claude-Web",
    "Meta-ExternalAgent",
    "Meta-ExternalFetcher",
    "FacebookBot",
    "facebookexternalhit",
    "PerplexityBot",
    "Bytespider",
    "Google-Extended",
    "Applebot-Extended",
    "cohere-ai",
    "Diffbot",
    "ImagesiftBot",
    "Omgilibot",
    "Omgili",
    "YouBot",
    "Amazonbot",
    "AI2Bot",
    "Ai2Bot-Dolma",
    "Scrapy",
    "PetalBot",
    "Semrushbot",
    "AhrefsBot",
    "MJ12bot",
    "DotBot",
    "Seekport",
    "BLEXBot",
    "DataForSeoBot",
    "magpie-crawler",
    "Timpibot",
    "Velenpublicwebcrawler",
    "Webzio-Extended",
    "iaskspider",
    "Kangaroo Bot",
    "img2dataset",
];

const DEFAULT_BLOCKED_IPS: &[&str] = &[
    "20.15.240.0/20",
    "20.171.206.0/23",
    "40.83.2.0/23",
    "52.230.152.0/21",
    "20.171.207.0/24",
];

impl RuleSet {
    /// Built-in rules, active before the first successful fetch.
    pub fn builtin() -> Self {
        Self {
            version: 1,
            updated_at: "2026-02-06".to_string(),
            blocked_uas: DEFAULT_BLOCKED_UAS.iter().map(|s| s.to_string()).collect(),
            blocked_ips: DEFAULT_BLOCKED_IPS.iter().map(|s| s.to_string()).collect(),
            header_patterns: vec![
                HeaderPattern::new("accept", r"^\*/\*$", 0.3),
                HeaderPattern::new("accept-language", r"^$", 0.5),
                HeaderPattern::new("accept-encoding", r"^$", 0.4),
            ],
            anomaly_threshold: 0.7,
        }
    }
}
