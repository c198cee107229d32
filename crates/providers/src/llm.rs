use crate::http::{base_url, build_client, map_send_error, read_json};
use async_trait::async_trait;
use coderag_protocol::ProviderError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(300);

const SERVICE: &str = "ollama";

/// Text generation backend used to answer from the routed context
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    fn name(&self) -> &str {
        "llm"
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Local Ollama server, non-streaming `/api/generate`
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaProvider {
    pub fn new(base_url_str: &str, model: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_timeout(base_url_str, model, DEFAULT_LLM_TIMEOUT)
    }

    pub fn with_timeout(
        base_url_str: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(ProviderError::Misconfigured("Ollama model is empty".to_string()));
        }
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url(SERVICE, base_url_str)?,
            model,
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        log::debug!("Generating with {} ({} prompt chars)", self.model, prompt.len());

        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| map_send_error(SERVICE, self.timeout, e))?;

        let body: GenerateResponse = read_json(SERVICE, self.timeout, response).await?;
        Ok(body.response.trim().to_string())
    }

    fn name(&self) -> &str {
        SERVICE
    }
}
