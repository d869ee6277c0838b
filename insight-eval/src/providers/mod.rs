//! LLM Provider implementations

pub mod ollama;
pub mod openai;
pub mod rate_limiter;
pub mod traits;

pub use ollama::OllamaClient;
pub use openai::OpenAIClient;
pub use rate_limiter::RateLimiter;
pub use traits::{
    CompletionRequest, CompletionResponse, LLMProvider, Message, ProviderError, ProviderResult,
};

use crate::config::LlmConfig;
use std::sync::Arc;

/// Create the provider named in the `[llm]` config section
pub fn create_provider(config: &LlmConfig) -> ProviderResult<Arc<dyn LLMProvider>> {
    match config.provider.to_lowercase().as_str() {
        "ollama" | "local" => {
            let client = OllamaClient::new()
                .with_base_url(&config.base_url)
                .with_model(&config.model)
                .with_rate_limit(config.rpm)
                .with_timeout(config.request_timeout());
            Ok(Arc::new(client))
        }
        "openai" | "gpt" => {
            let mut client = OpenAIClient::from_env(&config.api_key_env)?
                .with_model(&config.model)
                .with_rate_limit(config.rpm)
                .with_timeout(config.request_timeout());
            // The Ollama default URL is meaningless for OpenAI
            if !config.base_url.contains(":11434") {
                client = client.with_base_url(&config.base_url);
            }
            Ok(Arc::new(client))
        }
        other => Err(ProviderError::Config(format!("Unknown provider: {}", other))),
    }
}
