//! LLM provider layer for chatmem.
//!
//! # Architecture
//!
//! - [`traits::LlmProvider`] — trait that all providers implement
//! - [`registry`] — static specs for the supported providers + matching logic
//! - [`http_provider::HttpProvider`] — generic OpenAI-compatible HTTP client
//! - [`http_provider::create_provider`] — convenience builder from model name + config
//! - [`condenser::LlmCondenser`] — summary condenser backed by a provider

pub mod condenser;
pub mod http_provider;
pub mod registry;
pub mod traits;

// Re-export main types for convenience
pub use condenser::LlmCondenser;
pub use http_provider::{create_provider, HttpProvider};
pub use registry::{ProviderConfig, ProviderSpec, PROVIDERS};
pub use traits::{LlmProvider, LlmRequestConfig, ProviderError};
