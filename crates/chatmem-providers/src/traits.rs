//! LLM Provider trait — the abstraction every chat backend implements.
//!
//! The `HttpProvider` in `http_provider.rs` covers all OpenAI-compatible APIs,
//! including local Ollama and vLLM servers.

use async_trait::async_trait;
use chatmem_core::types::{LlmResponse, Message};

/// Configuration passed to each LLM call.
#[derive(Clone, Debug)]
pub struct LlmRequestConfig {
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
}

impl Default for LlmRequestConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

/// Errors from talking to an LLM backend.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// No configured provider matches the requested model.
    #[error("no configured provider found for model '{0}'; set an API key (e.g. OPENROUTER_API_KEY) or an Ollama api_base")]
    NoProvider(String),

    /// Connection, TLS or timeout failure.
    #[error("error calling LLM: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("error calling LLM: {status}: {body}")]
    Api { status: u16, body: String },

    /// The response body was not a chat completion.
    #[error("error parsing LLM response: {0}")]
    Parse(String),

    /// The API returned no choices.
    #[error("LLM returned no choices")]
    EmptyResponse,
}

/// Trait that all LLM providers must implement.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request.
    ///
    /// # Arguments
    /// * `messages` — Conversation history in OpenAI format.
    /// * `model`    — Model identifier (e.g. `"ollama/llama3.2"`, `"gpt-4o-mini"`).
    /// * `config`   — Temperature, max_tokens, etc.
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        config: &LlmRequestConfig,
    ) -> Result<LlmResponse, ProviderError>;

    /// The default model for this provider instance.
    fn default_model(&self) -> &str;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
