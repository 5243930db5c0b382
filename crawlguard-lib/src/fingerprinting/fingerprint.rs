use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::fingerprinting::request::RequestView;

/// Snapshot of one request's client attributes, reported for offline analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fingerprint {
    pub ip: String,
    pub user_agent: String,
    /// Lower-cased header names in arrival order
    pub header_order: Vec<String>,
    /// Lower-cased header name to joined value
    pub headers: BTreeMap<String, String>,
    pub path: String,
    pub method: String,
    /// Capture time, epoch milliseconds
    pub ts: u64,
}

impl Fingerprint {
    pub fn from_view(view: &RequestView) -> Self {
        Self::from_view_at(view, now_millis())
    }

    pub fn from_view_at(view: &RequestView, ts: u64) -> Self {
        Self {
            ip: view.ip.clone(),
            user_agent: view.user_agent.clone(),
            header_order: view.headers.order().to_vec(),
            headers: view
                .headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            path: view.path.clone(),
            method: view.method.clone(),
            ts,
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
