//! Memory-backed chat: prompt = system prompt + session context + new input.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use chatmem_core::types::Message;
use chatmem_providers::{create_provider, LlmProvider, LlmRequestConfig};

use crate::workspace::Workspace;

pub struct ChatSession<'a> {
    ws: &'a Workspace,
    provider: Arc<dyn LlmProvider>,
    model: String,
    request: LlmRequestConfig,
    session_id: String,
}

impl<'a> ChatSession<'a> {
    /// Open a chat on `session_id` using the configured chat model.
    /// The session is created with the default strategy if needed.
    pub fn open(ws: &'a Workspace, session_id: &str) -> Result<Self> {
        let model = ws.config.chat.model.clone();
        let provider = create_provider(&model, &ws.providers())
            .with_context(|| format!("cannot chat with model '{model}'"))?;
        Self::with_provider(ws, Arc::new(provider), session_id)
    }

    pub fn with_provider(
        ws: &'a Workspace,
        provider: Arc<dyn LlmProvider>,
        session_id: &str,
    ) -> Result<Self> {
        ws.memory.ensure(session_id)?;
        Ok(ChatSession {
            ws,
            provider,
            model: ws.config.chat.model.clone(),
            request: LlmRequestConfig {
                max_tokens: ws.config.chat.max_tokens,
                temperature: ws.config.chat.temperature,
            },
            session_id: session_id.to_string(),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn workspace(&self) -> &Workspace {
        self.ws
    }

    fn build_messages(&self, input: &str) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        let system_prompt = self.ws.config.chat.system_prompt.trim();
        if !system_prompt.is_empty() {
            messages.push(Message::system(system_prompt));
        }
        messages.extend(self.ws.memory.context(&self.session_id)?);
        messages.push(Message::user(input));
        Ok(messages)
    }

    /// Send one message and record the exchange.
    pub async fn turn(&self, input: &str) -> Result<String> {
        let messages = self.build_messages(input)?;
        debug!(
            session = %self.session_id,
            messages = messages.len(),
            provider = self.provider.display_name(),
            "sending chat turn"
        );

        let response = self
            .provider
            .chat(&messages, &self.model, &self.request)
            .await
            .context("LLM call failed")?;

        let Some(reply) = response.text().map(str::to_string) else {
            warn!(session = %self.session_id, "empty reply, exchange not recorded");
            anyhow::bail!("model returned an empty reply; exchange not recorded");
        };

        self.ws.memory.append(&self.session_id, input, reply.as_str()).await?;
        self.ws.persist(&self.session_id)?;
        Ok(reply)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
