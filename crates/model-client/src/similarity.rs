use async_trait::async_trait;
use deal_core::{Comparable, DealError, SimilarityIndex};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ModelError, ModelResult};

#[derive(Debug, Clone, Serialize)]
struct QueryRequest<'a> {
    text: &'a str,
    k: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Comparable>,
}

/// HTTP front for the vector store holding previously priced products.
#[derive(Clone)]
pub struct HttpSimilarityIndex {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSimilarityIndex {
    pub fn new(base_url: String, timeout: Duration) -> ModelResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub async fn query(&self, text: &str, k: usize) -> ModelResult<Vec<Comparable>> {
        let response = self
            .client
            .post(format!("{}/query", self.base_url))
            .json(&QueryRequest { text, k })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ModelError::ServiceUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        let mut results = response.json::<QueryResponse>().await?.results;
        results.truncate(k);
        Ok(results)
    }
}

#[async_trait]
impl SimilarityIndex for HttpSimilarityIndex {
    async fn find_similar(&self, description: &str, k: usize) -> Result<Vec<Comparable>, DealError> {
        Ok(self.query(description, k).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_query_truncates_to_k() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    { "description": "Boat Airdopes 141", "price": 1099.0 },
                    { "description": "Noise Buds VS104", "price": 999.0 },
                    { "description": "realme Buds T100", "price": 1299.0 }
                ]
            })))
            .mount(&server)
            .await;

        let index = HttpSimilarityIndex::new(server.uri(), Duration::from_secs(5)).unwrap();
        let similar = index.find_similar("wireless earbuds", 2).await.unwrap();
        assert_eq!(similar.len(), 2);
        assert_eq!(similar[0].description, "Boat Airdopes 141");
    }

    #[tokio::test]
    async fn test_query_missing_results_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let index = HttpSimilarityIndex::new(server.uri(), Duration::from_secs(5)).unwrap();
        assert!(index.find_similar("anything", 5).await.unwrap().is_empty());
    }
}
