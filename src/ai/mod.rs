//! Text-Generation Backend Abstraction
//!
//! Defines the `TextProvider` trait used by the synthesizer and content
//! generator, plus retry and response-extraction helpers.
//!
//! ## Modules
//!
//! - `openrouter`: OpenAI-compatible chat-completions provider
//! - `retry`: bounded retry with exponential backoff and jitter
//! - `validation`: JSON extraction from fenced/prose responses

mod openrouter;
mod retry;
mod validation;

pub use openrouter::OpenRouterProvider;
pub use retry::{RetryExhausted, RetryPolicy};
pub use validation::extract_json_from_response;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::types::{FlowError, Result};

/// Shared provider type for concurrent use across pipeline stages
pub type SharedProvider = Arc<dyn TextProvider>;

// =============================================================================
// Provider Configuration
// =============================================================================

/// Configuration for text-generation backends
///
/// API keys are never serialized to output and are redacted in debug output;
/// the provider converts the key to `SecretString` internally.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider type: "openrouter"
    pub provider: String,
    /// Model name (provider-specific)
    pub model: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Temperature for generation
    pub temperature: f32,
    /// API key; never serialized to output
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,
    /// Maximum tokens to generate
    pub max_tokens: usize,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: "openrouter".to_string(),
            model: None,
            timeout_secs: crate::constants::network::DEFAULT_TIMEOUT_SECS,
            temperature: 0.7,
            api_key: None,
            api_base: None,
            max_tokens: 2048,
        }
    }
}

// =============================================================================
// Text Provider Trait
// =============================================================================

/// Text-generation backend producing structured JSON output
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Generate structured output for the given system + user prompt.
    /// The returned value is the parsed JSON payload of the response.
    async fn generate(&self, system: &str, prompt: &str) -> Result<Value>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;
}

/// Create a shared provider from configuration
pub fn create_provider(config: &ProviderConfig) -> Result<SharedProvider> {
    match config.provider.as_str() {
        "openrouter" => Ok(Arc::new(OpenRouterProvider::new(config.clone())?)),
        _ => Err(FlowError::Config(format!(
            "Unknown provider: {}. Supported: openrouter",
            config.provider
        ))),
    }
}
