//! Config loader — reads `~/.chatmem/config.json`, merges env vars, and
//! applies legacy migrations.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.chatmem/config.json`
//! 3. Environment variables `CHATMEM_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    load_config_from_path(&config_path)
}

/// Load config from a specific file path.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let mut raw: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    migrate_config(&mut raw);

    let config: Config = match serde_json::from_value(raw) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to deserialize config: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply legacy config migrations.
///
/// The service this grew out of used `memory_type` and `k`; accept both as
/// aliases for `memory.defaultStrategy` and `memory.windowSize`.
fn migrate_config(raw: &mut serde_json::Value) {
    let Some(memory) = raw.get_mut("memory").and_then(|m| m.as_object_mut()) else {
        return;
    };

    let aliases = [("memoryType", "defaultStrategy"), ("k", "windowSize")];
    for (legacy, current) in aliases {
        if let Some(val) = memory.remove(legacy) {
            if !memory.contains_key(current) {
                memory.insert(current.to_string(), val);
                debug!("Migrated memory.{legacy} → memory.{current}");
            }
        }
    }
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `CHATMEM_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `CHATMEM_MEMORY__DEFAULT_STRATEGY` → `memory.default_strategy`
/// - `CHATMEM_MEMORY__WINDOW_SIZE` → `memory.window_size`
/// - `CHATMEM_MEMORY__MAX_RECENT` → `memory.max_recent`
/// - `CHATMEM_MEMORY__CONDENSE_TIMEOUT_SECS` → `memory.condense_timeout_secs`
/// - `CHATMEM_MEMORY__SUMMARY_MAX_TOKENS` → `memory.summary_max_tokens`
/// - `CHATMEM_CHAT__MODEL` / `CHATMEM_CHAT__SUMMARY_MODEL`
/// - `CHATMEM_CHAT__MAX_TOKENS` / `CHATMEM_CHAT__TEMPERATURE`
/// - `CHATMEM_STORAGE__SESSIONS_DIR` / `CHATMEM_STORAGE__PERSIST`
/// - `CHATMEM_PROVIDERS__<NAME>__API_KEY` / `CHATMEM_PROVIDERS__<NAME>__API_BASE`
fn apply_env_overrides(mut config: Config) -> Config {
    // Memory
    if let Ok(val) = std::env::var("CHATMEM_MEMORY__DEFAULT_STRATEGY") {
        config.memory.default_strategy = val;
    }
    if let Some(n) = env_parse::<usize>("CHATMEM_MEMORY__WINDOW_SIZE") {
        config.memory.window_size = n;
    }
    if let Some(n) = env_parse::<usize>("CHATMEM_MEMORY__MAX_RECENT") {
        config.memory.max_recent = n;
    }
    if let Some(n) = env_parse::<u64>("CHATMEM_MEMORY__CONDENSE_TIMEOUT_SECS") {
        config.memory.condense_timeout_secs = n;
    }
    if let Some(n) = env_parse::<u32>("CHATMEM_MEMORY__SUMMARY_MAX_TOKENS") {
        config.memory.summary_max_tokens = n;
    }

    // Chat
    if let Ok(val) = std::env::var("CHATMEM_CHAT__MODEL") {
        config.chat.model = val;
    }
    if let Ok(val) = std::env::var("CHATMEM_CHAT__SUMMARY_MODEL") {
        config.chat.summary_model = val;
    }
    if let Some(n) = env_parse::<u32>("CHATMEM_CHAT__MAX_TOKENS") {
        config.chat.max_tokens = n;
    }
    if let Some(t) = env_parse::<f64>("CHATMEM_CHAT__TEMPERATURE") {
        config.chat.temperature = t;
    }

    // Storage
    if let Ok(val) = std::env::var("CHATMEM_STORAGE__SESSIONS_DIR") {
        config.storage.sessions_dir = val;
    }
    if let Ok(val) = std::env::var("CHATMEM_STORAGE__PERSIST") {
        config.storage.persist = val == "true" || val == "1";
    }

    // Providers
    for name in ["ollama", "vllm", "openrouter", "openai", "anthropic", "deepseek", "groq"] {
        if let Some(provider) = config.providers.get_by_name_mut(name) {
            apply_provider_env(provider, &name.to_uppercase());
        }
    }

    config
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let val = std::env::var(key).ok()?;
    match val.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring unparseable value for {key}: {val}");
            None
        }
    }
}

/// Apply env var overrides for a single provider.
fn apply_provider_env(provider: &mut super::schema::ProviderConfig, name: &str) {
    if let Ok(val) = std::env::var(format!("CHATMEM_PROVIDERS__{name}__API_KEY")) {
        provider.api_key = val;
    }
    if let Ok(val) = std::env::var(format!("CHATMEM_PROVIDERS__{name}__API_BASE")) {
        provider.api_base = Some(val);
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
