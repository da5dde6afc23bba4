//! Text-generation capability used by the composer.
//!
//! Every backend implements [`TextGenerationProvider`]; which one runs is
//! decided once by [`build_provider`] from [`GenerationConfig`].

pub mod anthropic;
pub mod mock;
pub mod ollama;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{ConfigError, GenerationConfig, ProviderKind};

pub use anthropic::AnthropicProvider;
pub use mock::ScriptedProvider;
pub use ollama::OllamaProvider;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Generation backend unreachable at {0}")]
    Connection(String),

    #[error("Generation backend returned error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("Generation backend rejected credentials (status {0})")]
    Unauthorized(u16),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Generation backend returned an empty response")]
    EmptyResponse,

    #[error("Scripted failure: {0}")]
    Scripted(String),
}

impl LlmError {
    /// Credential problems are infrastructure failures and must not be
    /// degraded into a fallback document.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::MissingCredentials(_))
    }
}

/// Per-call generation limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 4000,
            temperature: 0.3,
        }
    }
}

#[async_trait]
pub trait TextGenerationProvider: Send + Sync {
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<String, LlmError>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}

/// Build the configured backend. Missing credentials fail here, before any
/// request reaches the pipeline.
pub fn build_provider(
    config: &GenerationConfig,
) -> Result<Arc<dyn TextGenerationProvider>, ConfigError> {
    let provider: Arc<dyn TextGenerationProvider> = match config.provider {
        ProviderKind::Ollama => Arc::new(OllamaProvider::new(
            &config.base_url,
            &config.model,
            config.timeout_secs,
        )?),
        ProviderKind::Anthropic => {
            let api_key = config
                .api_key
                .clone()
                .ok_or(ConfigError::MissingApiKey {
                    provider: "anthropic",
                    env_var: "ANTHROPIC_API_KEY",
                })?;
            Arc::new(AnthropicProvider::new(
                &config.base_url,
                &config.model,
                &api_key,
                config.timeout_secs,
            )?)
        }
        ProviderKind::Mock => Arc::new(ScriptedProvider::offline()),
    };
    tracing::info!(provider = provider.name(), model = %config.model, "Generation provider ready");
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anthropic_without_key_is_configuration_error() {
        let config = GenerationConfig {
            provider: ProviderKind::Anthropic,
            api_key: None,
            ..GenerationConfig::default()
        };
        let err = build_provider(&config).err().unwrap();
        assert!(matches!(err, ConfigError::MissingApiKey { .. }));
    }

    #[test]
    fn anthropic_with_key_builds() {
        let config = GenerationConfig {
            provider: ProviderKind::Anthropic,
            api_key: Some("sk-test".into()),
            base_url: "https://api.anthropic.com".into(),
            ..GenerationConfig::default()
        };
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn ollama_is_default_backend() {
        let provider = build_provider(&GenerationConfig::default()).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn mock_backend_selected_by_config() {
        let config = GenerationConfig {
            provider: ProviderKind::Mock,
            ..GenerationConfig::default()
        };
        assert_eq!(build_provider(&config).unwrap().name(), "mock");
    }

    #[test]
    fn credential_errors_are_configuration() {
        assert!(LlmError::Unauthorized(401).is_configuration());
        assert!(LlmError::MissingCredentials("x".into()).is_configuration());
        assert!(!LlmError::EmptyResponse.is_configuration());
        assert!(!LlmError::Connection("http://x".into()).is_configuration());
    }
}
