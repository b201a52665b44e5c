//! Configuration schema.
//!
//! Hierarchy: `Config` → `MemoryConfig`, `ChatConfig`, `StorageConfig`,
//! `ProvidersConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use tracing::warn;

use crate::memory::{MemoryParams, MemoryStrategy, StrategyKind};

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.chatmem/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub memory: MemoryConfig,
    pub chat: ChatConfig,
    pub storage: StorageConfig,
    pub providers: ProvidersConfig,
}

// ─────────────────────────────────────────────
// Memory
// ─────────────────────────────────────────────

/// Defaults applied by the memory manager.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryConfig {
    /// Strategy used by `ensure` when a session does not exist yet.
    pub default_strategy: String,
    /// Default K for `buffer_window`.
    pub window_size: usize,
    /// Default N (raw exchanges kept verbatim) for `summary_buffer`.
    pub max_recent: usize,
    /// Upper bound on a single condensation call.
    pub condense_timeout_secs: u64,
    /// Token budget for each generated summary.
    pub summary_max_tokens: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            default_strategy: "buffer".to_string(),
            window_size: 10,
            max_recent: 10,
            condense_timeout_secs: 60,
            summary_max_tokens: 512,
        }
    }
}

impl MemoryConfig {
    /// Resolve `default_strategy` into a concrete strategy.
    ///
    /// Unknown names or non-positive sizes fall back to `buffer`.
    pub fn default_strategy(&self) -> MemoryStrategy {
        let resolved = self
            .default_strategy
            .parse::<StrategyKind>()
            .and_then(|kind| MemoryStrategy::build(kind, &MemoryParams::default(), self));

        match resolved {
            Ok(strategy) => strategy,
            Err(e) => {
                warn!(
                    strategy = %self.default_strategy,
                    error = %e,
                    "invalid default memory strategy, using buffer"
                );
                MemoryStrategy::Buffer
            }
        }
    }

    /// Condensation timeout as a `Duration`.
    pub fn condense_timeout(&self) -> Duration {
        Duration::from_secs(self.condense_timeout_secs.max(1))
    }
}

// ─────────────────────────────────────────────
// Chat
// ─────────────────────────────────────────────

/// Settings for the memory-backed chat command and the LLM condenser.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatConfig {
    /// LLM model identifier (e.g. `"ollama/llama3.2"`, `"gpt-4o-mini"`).
    pub model: String,
    /// Model used for condensation; falls back to `model` when empty.
    pub summary_model: String,
    /// Maximum tokens to generate per response.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
    /// System prompt prepended to every chat request.
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "ollama/llama3.2".to_string(),
            summary_model: String::new(),
            max_tokens: 2048,
            temperature: 0.7,
            system_prompt: "You are a helpful DevOps and infrastructure assistant.".to_string(),
        }
    }
}

impl ChatConfig {
    /// The model used for condensation calls.
    pub fn summary_model(&self) -> &str {
        if self.summary_model.is_empty() {
            &self.model
        } else {
            &self.summary_model
        }
    }
}

// ─────────────────────────────────────────────
// Storage
// ─────────────────────────────────────────────

/// Where and whether sessions are persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    /// Directory holding one `.jsonl` file per session.
    pub sessions_dir: String,
    /// Write sessions back to disk after each command.
    pub persist: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sessions_dir: "~/.chatmem/sessions".to_string(),
            persist: true,
        }
    }
}

// ─────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────

/// Configuration for a single LLM provider (API key, base URL, headers).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// API key for authentication.
    #[serde(default)]
    pub api_key: String,
    /// Custom API base URL (overrides provider default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
}

impl ProviderConfig {
    /// Whether this provider has a configured API key.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Whether a self-hosted provider has somewhere to connect to.
    pub fn has_endpoint(&self) -> bool {
        self.api_base.as_deref().is_some_and(|b| !b.is_empty())
    }
}

/// All provider configurations.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub ollama: ProviderConfig,
    #[serde(default)]
    pub vllm: ProviderConfig,
    #[serde(default)]
    pub openrouter: ProviderConfig,
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub anthropic: ProviderConfig,
    #[serde(default)]
    pub deepseek: ProviderConfig,
    #[serde(default)]
    pub groq: ProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            ollama: ProviderConfig {
                api_base: Some("http://localhost:11434/v1".to_string()),
                ..Default::default()
            },
            vllm: ProviderConfig::default(),
            openrouter: ProviderConfig::default(),
            openai: ProviderConfig::default(),
            anthropic: ProviderConfig::default(),
            deepseek: ProviderConfig::default(),
            groq: ProviderConfig::default(),
        }
    }
}

impl ProvidersConfig {
    fn entries(&self) -> [(&'static str, &ProviderConfig); 7] {
        [
            ("ollama", &self.ollama),
            ("vllm", &self.vllm),
            ("openrouter", &self.openrouter),
            ("openai", &self.openai),
            ("anthropic", &self.anthropic),
            ("deepseek", &self.deepseek),
            ("groq", &self.groq),
        ]
    }

    /// Get a provider config by name (e.g. `"ollama"`).
    pub fn get_by_name(&self, name: &str) -> Option<&ProviderConfig> {
        self.entries()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| c)
    }

    /// Mutable lookup by name, used by env overrides.
    pub fn get_by_name_mut(&mut self, name: &str) -> Option<&mut ProviderConfig> {
        match name {
            "ollama" => Some(&mut self.ollama),
            "vllm" => Some(&mut self.vllm),
            "openrouter" => Some(&mut self.openrouter),
            "openai" => Some(&mut self.openai),
            "anthropic" => Some(&mut self.anthropic),
            "deepseek" => Some(&mut self.deepseek),
            "groq" => Some(&mut self.groq),
            _ => None,
        }
    }

    /// Convert to a map for use with the provider registry.
    pub fn to_map(&self) -> HashMap<String, ProviderConfig> {
        self.entries()
            .into_iter()
            .map(|(name, config)| (name.to_string(), config.clone()))
            .collect()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
