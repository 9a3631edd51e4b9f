use async_trait::async_trait;
use deal_core::json_repair::parse_concatenated;
use deal_core::{CompletionModel, CompletionRequest, DealError};
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::{ModelError, ModelResult};

/// Wire format spoken by the completion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionBackend {
    /// Ollama `/api/generate`
    Ollama,
    /// OpenAI-compatible `/v1/chat/completions` (LM Studio, vLLM, hosted APIs)
    OpenAiCompatible,
    /// llama.cpp server `/completion`
    LlamaCpp,
}

impl CompletionBackend {
    pub fn detect(endpoint: &str) -> Self {
        if endpoint.contains(":11434") || endpoint.ends_with("/api/generate") {
            CompletionBackend::Ollama
        } else if endpoint.contains("/v1/") {
            CompletionBackend::OpenAiCompatible
        } else {
            CompletionBackend::LlamaCpp
        }
    }
}

#[derive(Clone)]
pub struct HttpCompletionClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    backend: CompletionBackend,
    api_key: Option<String>,
}

impl HttpCompletionClient {
    pub fn new(endpoint: String, model: String, timeout: Duration) -> ModelResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let backend = CompletionBackend::detect(&endpoint);
        Ok(Self {
            client,
            endpoint,
            model,
            backend,
            api_key: None,
        })
    }

    /// Bearer token for hosted OpenAI-compatible endpoints.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn backend(&self) -> CompletionBackend {
        self.backend
    }

    fn payload(&self, request: &CompletionRequest) -> Value {
        match self.backend {
            CompletionBackend::Ollama => {
                let mut payload = json!({
                    "model": self.model,
                    "prompt": request.prompt,
                    "stream": false,
                });
                if let Some(system) = &request.system {
                    payload["system"] = json!(system);
                }
                if request.json_output {
                    payload["format"] = json!("json");
                }
                if let Some(max_tokens) = request.max_tokens {
                    payload["options"] = json!({ "num_predict": max_tokens });
                }
                payload
            }
            CompletionBackend::OpenAiCompatible => {
                let mut messages = Vec::new();
                if let Some(system) = &request.system {
                    messages.push(json!({ "role": "system", "content": system }));
                }
                messages.push(json!({ "role": "user", "content": request.prompt }));
                let mut payload = json!({
                    "model": self.model,
                    "messages": messages,
                });
                if request.json_output {
                    payload["response_format"] = json!({ "type": "json_object" });
                }
                if let Some(max_tokens) = request.max_tokens {
                    payload["max_tokens"] = json!(max_tokens);
                }
                payload
            }
            CompletionBackend::LlamaCpp => {
                let prompt = match &request.system {
                    Some(system) => format!("{}\n\n{}", system, request.prompt),
                    None => request.prompt.clone(),
                };
                let mut payload = json!({ "model": self.model, "prompt": prompt });
                if let Some(max_tokens) = request.max_tokens {
                    payload["n_predict"] = json!(max_tokens);
                }
                payload
            }
        }
    }

    pub async fn generate(&self, request: &CompletionRequest) -> ModelResult<String> {
        let mut builder = self.client.post(&self.endpoint).json(&self.payload(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(ModelError::ServiceUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        let raw = response.text().await?;
        extract_completion_text(&raw)
            .ok_or_else(|| ModelError::InvalidResponse(raw.trim().to_string()))
    }
}

/// Pull the generated text out of any of the supported response shapes.
///
/// A single JSON body is read directly. Streaming-style bodies made of several
/// concatenated chunks have their text fields joined in order.
pub fn extract_completion_text(raw: &str) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
        return text_field(&value).map(str::to_string);
    }

    let chunks = parse_concatenated(raw);
    let text: String = chunks.iter().filter_map(text_field).collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn text_field(value: &Value) -> Option<&str> {
    value
        .get("response")
        .and_then(Value::as_str)
        .or_else(|| value.pointer("/choices/0/message/content").and_then(Value::as_str))
        .or_else(|| value.get("content").and_then(Value::as_str))
}

#[async_trait]
impl CompletionModel for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, DealError> {
        tracing::debug!("Calling {:?} completion endpoint {}", self.backend, self.endpoint);
        Ok(self.generate(request).await?)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
