//! Model backend capability
//!
//! [`ModelBackend`] is the seam between metric scoring and whatever model
//! produces the structured reply. [`LlmBackend`] adapts any
//! [`LLMProvider`] to it; tests substitute scripted backends.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::evaluation::metric::{SCORE_MAX, SCORE_MIN};
use crate::providers::{
    CompletionRequest, CompletionResponse, LLMProvider, Message, ProviderError, ProviderResult,
};

/// Retries after a provider reports rate limiting
const RATE_LIMIT_RETRIES: u32 = 2;

/// A rendered prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Shape the backend is asked to reply with
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    pub name: String,
    /// JSON schema passed to providers that support constrained output
    pub json_schema: Value,
    /// Fields that must be present in every reply
    pub required: Vec<String>,
}

impl ResponseSchema {
    /// `{"score": int, "explanation": str}`
    pub fn metric_score() -> Self {
        Self {
            name: "metric_score".to_string(),
            json_schema: json!({
                "type": "object",
                "properties": {
                    "score": {
                        "type": "integer",
                        "minimum": SCORE_MIN,
                        "maximum": SCORE_MAX
                    },
                    "explanation": { "type": "string" }
                },
                "required": ["score", "explanation"]
            }),
            required: vec!["score".to_string(), "explanation".to_string()],
        }
    }
}

/// Structured reply; field values are not validated beyond presence
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub fields: Map<String, Value>,
    pub raw: String,
}

impl ParsedResponse {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// String field, or the JSON text of a non-string value
    pub fn text(&self, field: &str) -> Option<String> {
        self.fields.get(field).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// Error types for backend calls
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Backend call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Capability that turns a prompt into a structured response
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Backend name used in logs
    fn name(&self) -> &str;

    async fn generate(
        &self,
        prompt: &Prompt,
        schema: &ResponseSchema,
        timeout: Duration,
    ) -> BackendResult<ParsedResponse>;
}

/// [`ModelBackend`] over an LLM provider
pub struct LlmBackend {
    provider: Arc<dyn LLMProvider>,
    model: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

impl LlmBackend {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            model: None,
            temperature: 0.1,
            max_tokens: 2048,
        }
    }

    pub fn from_config(provider: Arc<dyn LLMProvider>, config: &LlmConfig) -> Self {
        Self::new(provider)
            .with_model(&config.model)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    async fn complete_with_retry(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
        let mut attempt = 0;
        loop {
            match self.provider.complete(request).await {
                Err(ProviderError::RateLimited { retry_after_ms }) if attempt < RATE_LIMIT_RETRIES => {
                    attempt += 1;
                    tracing::warn!(
                        "Rate limited on {}, waiting {}ms (retry {} of {})",
                        self.provider.name(),
                        retry_after_ms,
                        attempt,
                        RATE_LIMIT_RETRIES
                    );
                    tokio::time::sleep(Duration::from_millis(retry_after_ms)).await;
                }
                result => return result,
            }
        }
    }
}

#[async_trait]
impl ModelBackend for LlmBackend {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        schema: &ResponseSchema,
        timeout: Duration,
    ) -> BackendResult<ParsedResponse> {
        let mut request = CompletionRequest::new(vec![Message::user(&prompt.user)], self.max_tokens)
            .with_system(&prompt.system)
            .with_temperature(self.temperature)
            .with_json_schema(schema.json_schema.clone());
        if let Some(model) = &self.model {
            request = request.with_model(model);
        }

        // Rate-limit waits count against the same budget as the call itself
        let response = tokio::time::timeout(timeout, self.complete_with_retry(&request))
            .await
            .map_err(|_| BackendError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| match e {
                ProviderError::Timeout { timeout_ms } => BackendError::Timeout { timeout_ms },
                other => BackendError::Provider(other),
            })?;

        tracing::debug!(
            "{} ({}) replied in {}ms, {} in / {} out tokens, finish={}: {}",
            self.provider.name(),
            response.model,
            response.latency_ms,
            response.input_tokens,
            response.output_tokens,
            response.finish_reason,
            response.content
        );
        if response.finish_reason == "length" {
            tracing::warn!(
                "{} reply hit max_tokens ({}); it may be truncated",
                self.provider.name(),
                self.max_tokens
            );
        }

        parse_response(&response.content, schema)
    }
}

/// Parse a raw model reply against `schema`.
///
/// `rationale` is accepted in place of `explanation`.
pub fn parse_response(raw: &str, schema: &ResponseSchema) -> BackendResult<ParsedResponse> {
    let value = extract_json_object(raw)
        .ok_or_else(|| BackendError::MalformedResponse(format!("no JSON object in reply: {}", truncate(raw, 200))))?;

    let Value::Object(mut fields) = value else {
        return Err(BackendError::MalformedResponse("reply is not a JSON object".to_string()));
    };

    if !fields.contains_key("explanation") {
        if let Some(rationale) = fields.remove("rationale") {
            fields.insert("explanation".to_string(), rationale);
        }
    }

    let missing: Vec<&str> = schema
        .required
        .iter()
        .filter(|f| !fields.contains_key(f.as_str()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(BackendError::MalformedResponse(format!(
            "missing field(s): {}",
            missing.join(", ")
        )));
    }

    Ok(ParsedResponse {
        fields,
        raw: raw.to_string(),
    })
}

/// Find the JSON object in a model reply: the whole text, a ```json fence,
/// any fence, then the outermost braces
pub fn extract_json_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    let mut candidates: Vec<&str> = vec![trimmed];

    if let Some(block) = trimmed.split("```json").nth(1) {
        candidates.push(block.split("```").next().unwrap_or("").trim());
    } else if let Some(block) = trimmed.split("```").nth(1) {
        candidates.push(block.trim());
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            candidates.push(&trimmed[start..=end]);
        }
    }

    candidates
        .into_iter()
        .filter(|c| !c.is_empty())
        .find_map(|c| serde_json::from_str::<Value>(c).ok().filter(Value::is_object))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::RateLimiter;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct FixedProvider {
        reply: String,
        delay: Duration,
        limiter: Arc<RateLimiter>,
        /// Returned, in order, before the reply
        errors: Mutex<VecDeque<ProviderError>>,
        calls: Mutex<usize>,
    }

    impl FixedProvider {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                delay: Duration::ZERO,
                limiter: Arc::new(RateLimiter::new(0)),
                errors: Mutex::new(VecDeque::new()),
                calls: Mutex::new(0),
            }
        }

        fn failing_with(reply: &str, errors: Vec<ProviderError>) -> Self {
            let provider = Self::new(reply);
            *provider.errors.lock().unwrap() = errors.into();
            provider
        }
    }

    #[async_trait]
    impl LLMProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        fn default_model(&self) -> &str {
            "fixed-model"
        }

        async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
            assert!(request.json_schema.is_some());
            *self.calls.lock().unwrap() += 1;
            let queued = self.errors.lock().unwrap().pop_front();
            if let Some(err) = queued {
                return Err(err);
            }
            tokio::time::sleep(self.delay).await;
            Ok(CompletionResponse {
                content: self.reply.clone(),
                model: "fixed-model".to_string(),
                input_tokens: 0,
                output_tokens: 0,
                finish_reason: "stop".to_string(),
                latency_ms: 0,
            })
        }

        fn rate_limiter(&self) -> &Arc<RateLimiter> {
            &self.limiter
        }

        async fn health_check(&self) -> ProviderResult<bool> {
            Ok(true)
        }
    }

    #[test]
    fn test_extract_plain_and_fenced() {
        assert_eq!(extract_json_object(r#"{"score": 4}"#).unwrap()["score"], 4);

        let fenced = "Here you go:\n```json\n{\"score\": 2, \"explanation\": \"thin\"}\n```\nThanks";
        assert_eq!(extract_json_object(fenced).unwrap()["score"], 2);

        let prose = "I'd say {\"score\": 5, \"explanation\": \"solid\"} overall.";
        assert_eq!(extract_json_object(prose).unwrap()["explanation"], "solid");

        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("[1, 2, 3]").is_none());
    }

    #[test]
    fn test_parse_accepts_rationale() {
        let parsed = parse_response(
            r#"{"score": 3, "rationale": "partly supported"}"#,
            &ResponseSchema::metric_score(),
        )
        .unwrap();
        assert_eq!(parsed.text("explanation").unwrap(), "partly supported");
    }

    #[test]
    fn test_parse_missing_field_is_malformed() {
        let err = parse_response(r#"{"explanation": "no score"}"#, &ResponseSchema::metric_score())
            .unwrap_err();
        assert!(matches!(err, BackendError::MalformedResponse(m) if m.contains("score")));
    }

    #[test]
    fn test_non_numeric_score_passes_through() {
        let parsed = parse_response(
            r#"{"score": "high", "explanation": "x"}"#,
            &ResponseSchema::metric_score(),
        )
        .unwrap();
        assert_eq!(parsed.get("score").unwrap(), "high");
    }

    #[tokio::test]
    async fn test_llm_backend_generate() {
        let backend = LlmBackend::new(Arc::new(FixedProvider::new(
            "```json\n{\"score\": 4, \"explanation\": \"good\"}\n```",
        )));
        let prompt = Prompt::new("judge", "rate it");
        let parsed = backend
            .generate(&prompt, &ResponseSchema::metric_score(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(parsed.get("score").unwrap(), 4);
        assert_eq!(backend.name(), "fixed");
    }

    #[tokio::test]
    async fn test_llm_backend_timeout() {
        let mut provider = FixedProvider::new("{}");
        provider.delay = Duration::from_millis(200);
        let backend = LlmBackend::new(Arc::new(provider));
        let err = backend
            .generate(
                &Prompt::new("s", "u"),
                &ResponseSchema::metric_score(),
                Duration::from_millis(20),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Timeout { timeout_ms: 20 }));
    }

    #[tokio::test]
    async fn test_provider_timeout_is_backend_timeout() {
        let backend = LlmBackend::new(Arc::new(FixedProvider::failing_with(
            "{}",
            vec![ProviderError::Timeout { timeout_ms: 30_000 }],
        )));
        let err = backend
            .generate(
                &Prompt::new("s", "u"),
                &ResponseSchema::metric_score(),
                Duration::from_secs(60),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Timeout { timeout_ms: 30_000 }));
    }

    #[tokio::test]
    async fn test_rate_limited_call_is_retried() {
        let provider = Arc::new(FixedProvider::failing_with(
            r#"{"score": 3, "explanation": "ok"}"#,
            vec![
                ProviderError::RateLimited { retry_after_ms: 5 },
                ProviderError::RateLimited { retry_after_ms: 5 },
            ],
        ));
        let backend = LlmBackend::new(provider.clone());
        let parsed = backend
            .generate(&Prompt::new("s", "u"), &ResponseSchema::metric_score(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(parsed.get("score").unwrap(), 3);
        assert_eq!(*provider.calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_retries_are_bounded() {
        let provider = Arc::new(FixedProvider::failing_with(
            "{}",
            (0..3).map(|_| ProviderError::RateLimited { retry_after_ms: 1 }).collect(),
        ));
        let backend = LlmBackend::new(provider.clone());
        let err = backend
            .generate(&Prompt::new("s", "u"), &ResponseSchema::metric_score(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Provider(ProviderError::RateLimited { .. })));
        assert_eq!(*provider.calls.lock().unwrap(), 3);
    }
}
