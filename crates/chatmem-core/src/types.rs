//! Core message types shared by the memory manager and the LLM providers.
//!
//! These model the OpenAI chat completions format, which Ollama, vLLM and the
//! hosted providers all accept on their `/v1/chat/completions` endpoints.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// Messages (OpenAI chat completions format)
// ─────────────────────────────────────────────

/// A chat message in the OpenAI format.
///
/// Each variant maps to a `role` field value.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role")]
pub enum Message {
    #[serde(rename = "system")]
    System { content: String },

    #[serde(rename = "user")]
    User { content: String },

    #[serde(rename = "assistant")]
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        /// Reasoning/thinking content from models like DeepSeek-R1 or Qwen3.
        #[serde(skip_serializing_if = "Option::is_none")]
        reasoning_content: Option<String>,
    },
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    /// Create an assistant message with text content.
    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: Some(content.into()),
            reasoning_content: None,
        }
    }

    /// The role string as sent on the wire.
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
        }
    }

    /// Text content of the message (empty for content-less assistant turns).
    pub fn text(&self) -> &str {
        match self {
            Message::System { content } | Message::User { content } => content,
            Message::Assistant { content, .. } => content.as_deref().unwrap_or(""),
        }
    }
}

// ─────────────────────────────────────────────
// LLM Response
// ─────────────────────────────────────────────

/// Response from an LLM provider after a chat completion call.
#[derive(Clone, Debug, Default)]
pub struct LlmResponse {
    /// Text content from the assistant.
    pub content: Option<String>,
    /// Why the model stopped generating.
    pub finish_reason: Option<String>,
    /// Token usage statistics.
    pub usage: Option<UsageInfo>,
    /// Reasoning/thinking content, when the model emits it separately.
    pub reasoning_content: Option<String>,
}

impl LlmResponse {
    /// Trimmed text content, `None` when the model returned nothing usable.
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Token usage statistics from the LLM.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UsageInfo {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// ─────────────────────────────────────────────
// Provider wire types
// ─────────────────────────────────────────────

/// Raw chat completion response from an OpenAI-compatible API.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: Option<String>,
    pub choices: Vec<ChatChoice>,
    pub usage: Option<UsageInfo>,
}

/// A single choice in a chat completion response.
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: AssistantMessage,
    pub finish_reason: Option<String>,
}

/// The assistant message within a chat completion choice.
#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
}

impl ChatCompletionResponse {
    /// Convert into an `LlmResponse`, or `None` if the API sent no choices.
    pub fn into_llm_response(self) -> Option<LlmResponse> {
        let usage = self.usage;
        self.choices.into_iter().next().map(|c| LlmResponse {
            content: c.message.content,
            finish_reason: c.finish_reason,
            usage,
            reasoning_content: c.message.reasoning_content,
        })
    }
}

/// Request body for an OpenAI-compatible chat completion API.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_system_message_serialization() {
        let msg = Message::system("Summary of the conversation so far.");
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "Summary of the conversation so far.");
    }

    #[test]
    fn test_assistant_message_omits_empty_fields() {
        let msg = Message::assistant("Docker is a container runtime.");
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "Docker is a container runtime.");
        assert!(json.get("reasoning_content").is_none());
    }

    #[test]
    fn test_user_message_deserialization() {
        let msg: Message = serde_json::from_value(json!({"role": "user", "content": "hi"})).unwrap();
        assert_eq!(msg, Message::user("hi"));
        assert_eq!(msg.role(), "user");
        assert_eq!(msg.text(), "hi");
    }

    #[test]
    fn test_assistant_without_content_has_empty_text() {
        let msg: Message =
            serde_json::from_value(json!({"role": "assistant", "content": null})).unwrap();
        assert_eq!(msg.text(), "");
    }

    #[test]
    fn test_chat_completion_response_parsing() {
        let api_json = json!({
            "id": "chatcmpl-abc123",
            "choices": [{
                "message": { "content": "Hello! How can I help?" },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 10,
                "completion_tokens": 8,
                "total_tokens": 18
            }
        });

        let resp: ChatCompletionResponse = serde_json::from_value(api_json).unwrap();
        let llm_resp = resp.into_llm_response().unwrap();

        assert_eq!(llm_resp.text(), Some("Hello! How can I help?"));
        assert_eq!(llm_resp.finish_reason.as_deref(), Some("stop"));
        assert_eq!(llm_resp.usage.as_ref().unwrap().total_tokens, 18);
    }

    #[test]
    fn test_chat_completion_empty_choices() {
        let resp: ChatCompletionResponse =
            serde_json::from_value(json!({"id": null, "choices": [], "usage": null})).unwrap();
        assert!(resp.into_llm_response().is_none());
    }

    #[test]
    fn test_blank_content_has_no_text() {
        let resp = LlmResponse {
            content: Some("   \n".to_string()),
            ..Default::default()
        };
        assert!(resp.text().is_none());
    }

    #[test]
    fn test_chat_request_skips_unset_options() {
        let request = ChatCompletionRequest {
            model: "llama3.2".to_string(),
            messages: vec![Message::user("Hello")],
            max_tokens: None,
            temperature: Some(0.2),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama3.2");
        assert_eq!(json["temperature"], 0.2);
        assert!(json.get("max_tokens").is_none());
    }
}
