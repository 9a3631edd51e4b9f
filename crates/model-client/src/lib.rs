pub mod completion;
pub mod error;
pub mod similarity;
pub mod specialist;

pub use completion::{CompletionBackend, HttpCompletionClient};
pub use error::{ModelError, ModelResult};
pub use similarity::HttpSimilarityIndex;
pub use specialist::SpecialistClient;

use std::time::Duration;

/// Endpoints of the model services the pipeline talks to.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub completion_endpoint: String,
    pub completion_model: String,
    pub specialist_url: String,
    pub similarity_url: String,
    pub timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            completion_endpoint: std::env::var("LLM_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:11434/api/generate".to_string()),
            completion_model: std::env::var("LLM_MODEL")
                .unwrap_or_else(|_| "llama3.2".to_string()),
            specialist_url: std::env::var("SPECIALIST_URL")
                .unwrap_or_else(|_| "http://localhost:8003".to_string()),
            similarity_url: std::env::var("SIMILARITY_URL")
                .unwrap_or_else(|_| "http://localhost:8005".to_string()),
            timeout: Duration::from_secs(
                std::env::var("MODEL_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(60),
            ),
        }
    }
}

/// All model-service clients built from one config.
#[derive(Clone)]
pub struct ModelClients {
    pub completion: HttpCompletionClient,
    pub specialist: SpecialistClient,
    pub similarity: HttpSimilarityIndex,
}

impl ModelClients {
    pub fn new(config: &ModelConfig) -> ModelResult<Self> {
        Ok(Self {
            completion: HttpCompletionClient::new(
                config.completion_endpoint.clone(),
                config.completion_model.clone(),
                config.timeout,
            )?,
            specialist: SpecialistClient::new(config.specialist_url.clone(), config.timeout)?,
            similarity: HttpSimilarityIndex::new(config.similarity_url.clone(), config.timeout)?,
        })
    }
}
