use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ModelError, ModelResult};

#[derive(Debug, Clone, Serialize)]
struct PriceRequest<'a> {
    description: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceResponse {
    pub price: f64,
}

/// Client for the separately hosted fine-tuned pricing model.
#[derive(Clone)]
pub struct SpecialistClient {
    client: reqwest::Client,
    base_url: String,
}

impl SpecialistClient {
    pub fn new(base_url: String, timeout: Duration) -> ModelResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// Ask the remote model for a single price estimate.
    pub async fn price(&self, description: &str) -> ModelResult<f64> {
        let response = self
            .client
            .post(format!("{}/price", self.base_url))
            .json(&PriceRequest { description })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ModelError::ServiceUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        let result = response.json::<PriceResponse>().await?;
        if !result.price.is_finite() {
            return Err(ModelError::InvalidResponse(format!(
                "non-finite price {}",
                result.price
            )));
        }
        Ok(result.price)
    }

    /// Check service health
    pub async fn health(&self) -> ModelResult<bool> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        Ok(response.status().is_success())
    }
}
