//! LLM-backed condenser for summary memory strategies.
//!
//! Each call asks the model to extend the running summary with one new
//! exchange (progressive summarization).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use chatmem_core::memory::{Condenser, Exchange, MemoryError};
use chatmem_core::types::Message;

use crate::traits::{LlmProvider, LlmRequestConfig};

const SYSTEM_PROMPT: &str = "You keep a running summary of a conversation between a human and an AI assistant. \
Extend the current summary with the new lines, keeping names, numbers, decisions and open questions. \
Write in the third person and reply with the new summary only.";

/// Folds exchanges into a summary by calling an LLM.
pub struct LlmCondenser {
    provider: Arc<dyn LlmProvider>,
    model: String,
    config: LlmRequestConfig,
}

impl LlmCondenser {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        LlmCondenser {
            provider,
            model: model.into(),
            config: LlmRequestConfig {
                max_tokens: 512,
                temperature: 0.2,
            },
        }
    }

    /// Cap the length of each generated summary.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    fn build_messages(summary: &str, exchange: &Exchange) -> Vec<Message> {
        let current = if summary.trim().is_empty() {
            "(none yet)"
        } else {
            summary.trim()
        };
        vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(format!(
                "Current summary:\n{current}\n\nNew lines of conversation:\n{}\n\nNew summary:",
                exchange.transcript()
            )),
        ]
    }
}

#[async_trait]
impl Condenser for LlmCondenser {
    async fn condense(&self, summary: &str, exchange: &Exchange) -> chatmem_core::memory::Result<String> {
        let messages = Self::build_messages(summary, exchange);
        let response = self
            .provider
            .chat(&messages, &self.model, &self.config)
            .await
            .map_err(|e| MemoryError::CondenseFailed(e.to_string()))?;

        let text = response
            .text()
            .ok_or_else(|| MemoryError::CondenseFailed("model returned an empty summary".to_string()))?;

        debug!(
            provider = self.provider.display_name(),
            chars = text.len(),
            "condensed exchange into summary"
        );
        Ok(text.to_string())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_provider::HttpProvider;
    use crate::registry::{find_by_name, ProviderConfig};
    use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn condenser_for(server: &MockServer) -> LlmCondenser {
        let config = ProviderConfig {
            api_base: Some(server.uri()),
            ..Default::default()
        };
        let provider = HttpProvider::new(&config, find_by_name("ollama").unwrap(), "llama3.2").unwrap();
        LlmCondenser::new(Arc::new(provider), "ollama/llama3.2")
    }

    fn reply(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-sum",
            "choices": [{
                "message": { "content": content },
                "finish_reason": "stop"
            }],
            "usage": null
        }))
    }

    #[test]
    fn test_prompt_contains_summary_and_transcript() {
        let messages = LlmCondenser::build_messages(
            "The human asked about db-3.",
            &Exchange::new("Is it fixed?", "Yes, disk was expanded."),
        );
        assert_eq!(messages.len(), 2);
        let prompt = messages[1].text();
        assert!(prompt.contains("The human asked about db-3."));
        assert!(prompt.contains("Human: Is it fixed?\nAI: Yes, disk was expanded."));
    }

    #[test]
    fn test_prompt_with_empty_summary() {
        let messages = LlmCondenser::build_messages("", &Exchange::new("hi", "hello"));
        assert!(messages[1].text().contains("(none yet)"));
    }

    #[tokio::test]
    async fn test_condense_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("Human: What is Docker?"))
            .respond_with(reply("  The human asked what Docker is.  "))
            .mount(&server)
            .await;

        let summary = condenser_for(&server)
            .condense("", &Exchange::new("What is Docker?", "A container runtime."))
            .await
            .unwrap();
        assert_eq!(summary, "The human asked what Docker is.");
    }

    #[tokio::test]
    async fn test_condense_sends_max_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({ "max_tokens": 256 })))
            .respond_with(reply("Short summary."))
            .expect(1)
            .mount(&server)
            .await;

        let summary = condenser_for(&server)
            .with_max_tokens(256)
            .condense("", &Exchange::new("a", "b"))
            .await
            .unwrap();
        assert_eq!(summary, "Short summary.");
    }

    #[tokio::test]
    async fn test_condense_api_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
            .mount(&server)
            .await;

        let err = condenser_for(&server)
            .condense("", &Exchange::new("a", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::CondenseFailed(ref msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn test_condense_empty_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(reply("   "))
            .mount(&server)
            .await;

        let err = condenser_for(&server)
            .condense("prior", &Exchange::new("a", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::CondenseFailed(_)));
    }

    #[tokio::test]
    async fn test_manager_folds_through_llm() {
        use chatmem_core::config::schema::MemoryConfig;
        use chatmem_core::memory::{MemoryManager, MemoryParams};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(reply("The human greeted the AI."))
            .mount(&server)
            .await;

        let memory = MemoryManager::new(Arc::new(condenser_for(&server)), MemoryConfig::default());
        memory
            .create("s", "summary_buffer", &MemoryParams::recent(1))
            .unwrap();
        memory.append("s", "hi", "hello").await.unwrap();
        memory.append("s", "status?", "all green").await.unwrap();

        assert_eq!(memory.summary("s").unwrap(), "The human greeted the AI.");
        let history = memory.history("s").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].human, "status?");
    }
}
