use thiserror::Error;

/// Every failure the deal pipeline knows how to recover from.
///
/// None of these are fatal: sources are skipped, estimators abstain, a
/// malformed completion turns into an empty cycle, and alert failures are
/// only logged.
#[derive(Error, Debug)]
pub enum DealError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Extraction degraded: {0}")]
    ExtractionDegraded(String),

    #[error("Estimator abstained: {0}")]
    EstimatorAbstained(String),

    #[error("All estimators abstained for: {0}")]
    EnsembleExhausted(String),

    #[error("Malformed completion response: {0}")]
    CompletionMalformed(String),

    #[error("Alert dispatch failed: {0}")]
    AlertDispatchFailed(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type DealResult<T> = Result<T, DealError>;
