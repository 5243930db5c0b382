use http::StatusCode;
use reqwest::Client;

use crate::error::{GuardError, Result};
use crate::rules::types::RuleSet;

/// Remote rule authority reached with `GET {api_url}/v1/rules`.
#[derive(Clone)]
pub struct RuleSource {
    client: Client,
    url: String,
    api_key: String,
}

impl RuleSource {
    pub fn new(client: Client, url: String, api_key: String) -> Self {
        Self { client, url, api_key }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the current rule set.
    ///
    /// Anything other than `200 OK` with a JSON body of the rule set shape is
    /// an error; the caller keeps its active rules.
    pub async fn fetch(&self) -> Result<RuleSet> {
        let resp = self
            .client
            .get(&self.url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(GuardError::RuleFetch)?;

        if resp.status() != StatusCode::OK {
            return Err(GuardError::RuleStatus(resp.status().as_u16()));
        }

        let body = resp.bytes().await.map_err(GuardError::RuleFetch)?;
        serde_json::from_slice::<RuleSet>(&body).map_err(|e| GuardError::RuleDecode(e.to_string()))
    }
}
