use std::time::Duration;

use tracing::debug;

use crate::utils::error::Result;

const DEFAULT_USER_AGENT: &str = "PriceWatch/0.1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Thin wrapper around a shared HTTP client. One fetch per item per run,
/// no retries; a failed fetch only skips the item that caused it.
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch the raw page body. Non-success HTTP statuses are errors.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        debug!(url, "fetching page");
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        debug!(url, bytes = body.len(), "fetched page");
        Ok(body)
    }
}
