use async_trait::async_trait;
use deal_core::{DealError, PageFetcher};
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0";

/// Plain GET with a generic browser user agent and a short timeout.
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, DealError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| DealError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, DealError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DealError::SourceUnavailable(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DealError::SourceUnavailable(format!(
                "HTTP {} for {}",
                status, url
            )));
        }

        response
            .text()
            .await
            .map_err(|e| DealError::SourceUnavailable(format!("{}: {}", url, e)))
    }
}
