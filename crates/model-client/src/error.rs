use deal_core::DealError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ModelResult<T> = Result<T, ModelError>;

impl From<ModelError> for DealError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidResponse(raw) => DealError::CompletionMalformed(raw),
            ModelError::Serialization(e) => DealError::Serialization(e),
            other => DealError::Http(other.to_string()),
        }
    }
}
