//! Ollama client for locally served models

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::rate_limiter::RateLimiter;
use super::traits::{
    CompletionRequest, CompletionResponse, LLMProvider, Message, ProviderError, ProviderResult,
};

const DEFAULT_MODEL: &str = "llama3.2";
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Client for the Ollama `/api/chat` endpoint
pub struct OllamaClient {
    base_url: String,
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
    default_model: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            http_client: Client::new(),
            rate_limiter: Arc::new(RateLimiter::new(0)),
            default_model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Set custom base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set requests per minute; zero disables limiting
    pub fn with_rate_limit(mut self, rpm: u32) -> Self {
        self.rate_limiter = Arc::new(RateLimiter::new(rpm));
        self
    }

    /// Set default model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// HTTP timeout for a single request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn map_send_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            ProviderError::Http(err)
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: String,
    messages: Vec<&'a Message>,
    stream: bool,
    /// Either the literal "json" or a JSON schema
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    model: String,
    message: OllamaMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

#[derive(Deserialize)]
struct OllamaError {
    error: String,
}

#[async_trait]
impl LLMProvider for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
        self.rate_limiter.acquire().await;

        let start = Instant::now();

        let system = request.system_prompt.as_ref().map(|s| Message::system(s.clone()));
        let messages: Vec<&Message> = system.iter().chain(request.messages.iter()).collect();

        let body = OllamaRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            messages,
            stream: false,
            format: request.json_schema.clone(),
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = self
            .http_client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<OllamaError>(&body) {
                Ok(error) => error.error,
                Err(_) => format!("HTTP {}: {}", status.as_u16(), body),
            };

            // Unknown model is a setup problem, not worth retrying
            if status == 404 {
                return Err(ProviderError::Config(format!("Ollama: {}", message)));
            }

            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(CompletionResponse {
            content: api_response.message.content,
            model: api_response.model,
            input_tokens: api_response.prompt_eval_count,
            output_tokens: api_response.eval_count,
            finish_reason: api_response.done_reason.unwrap_or_else(|| "stop".to_string()),
            latency_ms,
        })
    }

    fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    async fn health_check(&self) -> ProviderResult<bool> {
        let response = self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(r) => Ok(r.status().is_success()),
            Err(e) => {
                tracing::debug!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }
}
