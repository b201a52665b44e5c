//! Generic HTTP-based LLM provider for OpenAI-compatible APIs.
//!
//! Talks directly to any OpenAI-compatible `/chat/completions` endpoint.
//!
//! Covers: Ollama, vLLM, OpenAI, Anthropic (compat endpoint), DeepSeek, Groq,
//!         OpenRouter.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, error, warn};

use chatmem_core::types::{ChatCompletionRequest, ChatCompletionResponse, LlmResponse, Message};

use crate::registry::{apply_model_overrides, resolve_model_name, ProviderConfig, ProviderSpec};
use crate::traits::{LlmProvider, LlmRequestConfig, ProviderError};

// ─────────────────────────────────────────────
// HttpProvider
// ─────────────────────────────────────────────

/// A generic LLM provider that talks to any OpenAI-compatible HTTP API.
pub struct HttpProvider {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    /// API base URL (e.g. `"http://localhost:11434/v1"`).
    api_base: String,
    /// API key for Bearer authentication. Empty for keyless local servers.
    api_key: String,
    /// Default model for this provider instance.
    default_model: String,
    /// Extra headers to send with each request.
    extra_headers: HeaderMap,
    /// Reference to the provider spec for model resolution and overrides.
    spec: &'static ProviderSpec,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("api_base", &self.api_base)
            .field("default_model", &self.default_model)
            .field("provider", &self.spec.display_name)
            .finish()
    }
}

impl HttpProvider {
    /// Create a new HttpProvider from a provider config and spec.
    ///
    /// # Arguments
    /// * `config`  — User's config (api_key, api_base, extra_headers)
    /// * `spec`    — Static provider spec from the registry
    /// * `model`   — The default model to use
    pub fn new(
        config: &ProviderConfig,
        spec: &'static ProviderSpec,
        model: &str,
    ) -> Result<Self, ProviderError> {
        // Resolve API base: config > spec default > standard OpenAI path
        let api_base = config
            .api_base
            .clone()
            .filter(|b| !b.is_empty())
            .or_else(|| spec.default_api_base.map(String::from))
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        // Build extra headers
        let mut extra_headers = HeaderMap::new();
        if let Some(ref headers) = config.extra_headers {
            for (key, value) in headers {
                if let (Ok(name), Ok(val)) = (
                    HeaderName::from_bytes(key.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    extra_headers.insert(name, val);
                } else {
                    warn!("Invalid header: {}={}", key, value);
                }
            }
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        Ok(HttpProvider {
            client,
            api_base,
            api_key: config.api_key.clone(),
            default_model: model.to_string(),
            extra_headers,
            spec,
        })
    }

    /// Build the full chat completions URL.
    fn completions_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/chat/completions", base)
    }

    /// Resolve the model name for this provider (strip routing prefixes).
    fn resolve_model(&self, model: &str) -> String {
        resolve_model_name(model, self.spec)
    }
}

#[async_trait]
impl LlmProvider for HttpProvider {
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        config: &LlmRequestConfig,
    ) -> Result<LlmResponse, ProviderError> {
        let resolved_model = self.resolve_model(model);
        let temperature = apply_model_overrides(model, self.spec, config.temperature);

        debug!(
            provider = self.spec.display_name,
            model = %resolved_model,
            messages = messages.len(),
            "Calling LLM"
        );

        let request_body = ChatCompletionRequest {
            model: resolved_model,
            messages: messages.to_vec(),
            max_tokens: Some(config.max_tokens),
            temperature: Some(temperature),
        };

        let mut request = self
            .client
            .post(self.completions_url())
            .headers(self.extra_headers.clone())
            .json(&request_body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await.map_err(|e| {
            error!(provider = self.spec.display_name, error = %e, "HTTP request failed");
            ProviderError::Http(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(
                provider = self.spec.display_name,
                status = %status,
                body = %body,
                "API error"
            );
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat_resp = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| {
                error!(
                    provider = self.spec.display_name,
                    error = %e,
                    "Failed to parse LLM response"
                );
                ProviderError::Parse(e.to_string())
            })?;

        let llm_resp = chat_resp
            .into_llm_response()
            .ok_or(ProviderError::EmptyResponse)?;
        debug!(
            provider = self.spec.display_name,
            has_content = llm_resp.content.is_some(),
            finish_reason = llm_resp.finish_reason.as_deref().unwrap_or("?"),
            "LLM response received"
        );
        Ok(llm_resp)
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn display_name(&self) -> &str {
        self.spec.display_name
    }
}

// ─────────────────────────────────────────────
// Builder (convenience)
// ─────────────────────────────────────────────

/// Build an HttpProvider from a model name and a map of provider configs.
///
/// This is the main entry point — it matches the model to a provider,
/// reads the config, and creates the HttpProvider.
pub fn create_provider(
    model: &str,
    providers: &HashMap<String, ProviderConfig>,
) -> Result<HttpProvider, ProviderError> {
    let (config, spec) = crate::registry::match_provider(model, providers)
        .ok_or_else(|| ProviderError::NoProvider(model.to_string()))?;

    debug!(
        provider = spec.display_name,
        model = model,
        api_base = config.api_base.as_deref().unwrap_or("default"),
        "Creating LLM provider"
    );

    HttpProvider::new(config, spec, model)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
