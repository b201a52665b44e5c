//! Provider registry — static specs for the supported LLM backends.
//!
//! Each `ProviderSpec` describes how to connect to a provider:
//! keywords for model matching, env var names, API bases, quirks, etc.

use std::collections::HashMap;

// ─────────────────────────────────────────────
// ProviderSpec — static metadata for one provider
// ─────────────────────────────────────────────

/// Static specification describing one LLM provider.
///
/// Used by the matching logic to figure out which provider to use for a given model.
#[derive(Clone, Debug)]
pub struct ProviderSpec {
    /// Internal name (e.g. `"openrouter"`).
    pub name: &'static str,
    /// Keywords to match in model names (lowercase). E.g. `&["claude", "anthropic"]`.
    pub keywords: &'static [&'static str],
    /// Environment variable consulted when the config has no API key.
    pub env_key: &'static str,
    /// Human-readable name for logs. E.g. `"OpenRouter"`.
    pub display_name: &'static str,
    /// Routing prefixes removed from the model name before the request.
    /// E.g. `&["ollama/"]` turns `"ollama/llama3.2"` into `"llama3.2"`.
    pub strip_prefixes: &'static [&'static str],
    /// Whether this is a gateway/aggregator (OpenRouter).
    /// Gateways are used as fallback when no direct match is found.
    pub is_gateway: bool,
    /// Whether this is a local/self-hosted provider (Ollama, vLLM).
    /// Locals need an `api_base` but no API key.
    pub is_local: bool,
    /// Default API base URL. Used for providers with non-OpenAI endpoints.
    pub default_api_base: Option<&'static str>,
    /// Per-model overrides applied to the request.
    pub model_overrides: &'static [ModelOverride],
}

/// A per-model parameter override.
#[derive(Clone, Debug)]
pub struct ModelOverride {
    /// Substring to match in the lowercase model name.
    pub pattern: &'static str,
    /// The field to override (currently only "temperature" is supported).
    pub field: OverrideField,
    /// The value to set.
    pub value: f64,
}

/// Fields that can be overridden per model.
#[derive(Clone, Debug)]
pub enum OverrideField {
    Temperature,
}

// ─────────────────────────────────────────────
// Providers (in priority order)
// ─────────────────────────────────────────────

/// Complete list of supported provider specifications, in matching priority order.
pub static PROVIDERS: &[ProviderSpec] = &[
    // 1. OpenRouter — gateway, fallback for unmatched models
    ProviderSpec {
        name: "openrouter",
        keywords: &["openrouter"],
        env_key: "OPENROUTER_API_KEY",
        display_name: "OpenRouter",
        strip_prefixes: &["openrouter/"],
        is_gateway: true,
        is_local: false,
        default_api_base: Some("https://openrouter.ai/api/v1"),
        model_overrides: &[],
    },
    // 2. Anthropic
    ProviderSpec {
        name: "anthropic",
        keywords: &["anthropic", "claude"],
        env_key: "ANTHROPIC_API_KEY",
        display_name: "Anthropic",
        strip_prefixes: &["anthropic/"],
        is_gateway: false,
        is_local: false,
        default_api_base: Some("https://api.anthropic.com/v1"),
        model_overrides: &[],
    },
    // 3. OpenAI — o1/o3 reasoning models only accept temperature=1.0
    ProviderSpec {
        name: "openai",
        keywords: &["openai", "gpt", "o1-", "o3-"],
        env_key: "OPENAI_API_KEY",
        display_name: "OpenAI",
        strip_prefixes: &["openai/"],
        is_gateway: false,
        is_local: false,
        default_api_base: None,
        model_overrides: &[
            ModelOverride {
                pattern: "o1-",
                field: OverrideField::Temperature,
                value: 1.0,
            },
            ModelOverride {
                pattern: "o3-",
                field: OverrideField::Temperature,
                value: 1.0,
            },
        ],
    },
    // 4. DeepSeek
    ProviderSpec {
        name: "deepseek",
        keywords: &["deepseek"],
        env_key: "DEEPSEEK_API_KEY",
        display_name: "DeepSeek",
        strip_prefixes: &["deepseek/"],
        is_gateway: false,
        is_local: false,
        default_api_base: Some("https://api.deepseek.com/v1"),
        model_overrides: &[],
    },
    // 5. Groq
    ProviderSpec {
        name: "groq",
        keywords: &["groq"],
        env_key: "GROQ_API_KEY",
        display_name: "Groq",
        strip_prefixes: &["groq/"],
        is_gateway: false,
        is_local: false,
        default_api_base: Some("https://api.groq.com/openai/v1"),
        model_overrides: &[],
    },
    // 6. Ollama (self-hosted)
    ProviderSpec {
        name: "ollama",
        keywords: &["ollama"],
        env_key: "OLLAMA_API_KEY",
        display_name: "Ollama",
        strip_prefixes: &["ollama/"],
        is_gateway: false,
        is_local: true,
        default_api_base: Some("http://localhost:11434/v1"),
        model_overrides: &[],
    },
    // 7. vLLM (self-hosted)
    ProviderSpec {
        name: "vllm",
        keywords: &["vllm"],
        env_key: "HOSTED_VLLM_API_KEY",
        display_name: "vLLM",
        strip_prefixes: &["vllm/", "hosted_vllm/"],
        is_gateway: false,
        is_local: true,
        default_api_base: None,
        model_overrides: &[],
    },
];

// ─────────────────────────────────────────────
// Matching functions
// ─────────────────────────────────────────────

/// Find a provider spec by matching keywords against a model name.
///
/// Skips gateways — those are fallback only.
/// Returns the first match in priority order.
pub fn find_by_model(model: &str) -> Option<&'static ProviderSpec> {
    let model_lower = model.to_lowercase();
    PROVIDERS.iter().find(|spec| {
        !spec.is_gateway
            && spec
                .keywords
                .iter()
                .any(|kw| model_lower.contains(kw))
    })
}

/// Find a provider spec by exact name.
pub fn find_by_name(name: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|spec| spec.name == name)
}

/// Resolve the model name for API calls by removing a routing prefix.
///
/// Only the first matching prefix is removed, so
/// `"openrouter/anthropic/claude-3"` becomes `"anthropic/claude-3"`.
pub fn resolve_model_name(model: &str, spec: &ProviderSpec) -> String {
    spec.strip_prefixes
        .iter()
        .find_map(|prefix| model.strip_prefix(prefix))
        .unwrap_or(model)
        .to_string()
}

/// Apply per-model overrides to request parameters.
///
/// Returns the temperature to send.
pub fn apply_model_overrides(
    model: &str,
    spec: &ProviderSpec,
    temperature: f64,
) -> f64 {
    let model_lower = model.to_lowercase();
    let mut temp = temperature;

    for ovr in spec.model_overrides {
        if model_lower.contains(ovr.pattern) {
            match ovr.field {
                OverrideField::Temperature => temp = ovr.value,
            }
        }
    }

    temp
}

/// Re-export the provider config from core — single source of truth.
pub use chatmem_core::config::schema::ProviderConfig;

/// Whether `config` is enough to talk to `spec`.
///
/// Hosted providers need an API key; local ones need an endpoint.
pub fn is_usable(config: &ProviderConfig, spec: &ProviderSpec) -> bool {
    if spec.is_local {
        config.has_endpoint() || config.is_configured()
    } else {
        config.is_configured()
    }
}

/// Fill empty API keys from each provider's environment variable.
pub fn with_env_keys(mut providers: HashMap<String, ProviderConfig>) -> HashMap<String, ProviderConfig> {
    for spec in PROVIDERS {
        if let Ok(key) = std::env::var(spec.env_key) {
            if key.is_empty() {
                continue;
            }
            let config = providers.entry(spec.name.to_string()).or_default();
            if config.api_key.is_empty() {
                config.api_key = key;
            }
        }
    }
    providers
}

/// Match a model name to a configured provider.
///
/// 1. Find by keyword match, only if that provider is usable.
/// 2. Fallback to the first configured gateway.
/// 3. Fallback to the first usable local provider.
pub fn match_provider<'a>(
    model: &str,
    providers: &'a HashMap<String, ProviderConfig>,
) -> Option<(&'a ProviderConfig, &'static ProviderSpec)> {
    let usable = |spec: &'static ProviderSpec| {
        providers
            .get(spec.name)
            .filter(|c| is_usable(c, spec))
            .map(|c| (c, spec))
    };

    // 1. Direct keyword match
    if let Some(found) = find_by_model(model).and_then(usable) {
        return Some(found);
    }

    // 2. Gateways, then locals
    PROVIDERS
        .iter()
        .filter(|s| s.is_gateway)
        .chain(PROVIDERS.iter().filter(|s| s.is_local))
        .find_map(usable)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
