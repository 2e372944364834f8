//! Shared HTTP transport for all provider adapters.

use crate::Result;
use std::time::Duration;
use uuid::Uuid;

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(crate::config::http_timeout_secs()))
            .pool_max_idle_per_host(
                std::env::var("LLM_RELAY_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(16),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()?;
        Ok(Self { client })
    }

    /// POST a JSON body. Bearer auth when a key is supplied; every call
    /// carries a correlation id header for log linkage.
    pub async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        api_key: Option<&str>,
        query: Option<&[(&str, &str)]>,
    ) -> Result<reqwest::Response> {
        let mut req = self.client.post(url).json(body);
        if let Some(key) = api_key {
            req = req.bearer_auth(key);
        }
        if let Some(q) = query {
            req = req.query(q);
        }
        req = req.header("x-llm-relay-request-id", Uuid::new_v4().to_string());
        Ok(req.send().await?)
    }
}
