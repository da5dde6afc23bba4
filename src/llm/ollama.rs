use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{GenerationOptions, LlmError, TextGenerationProvider};
use crate::config::ConfigError;

/// Ollama HTTP backend for local inference.
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
    temperature: f32,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[async_trait]
impl TextGenerationProvider for OllamaProvider {
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                num_predict: options.max_tokens,
                temperature: options.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    LlmError::HttpClient(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    LlmError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;

        if parsed.response.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(parsed.response)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_keeps_settings() {
        let provider = OllamaProvider::new("http://localhost:11434", "llama3.1:8b", 120).unwrap();
        assert_eq!(provider.base_url, "http://localhost:11434");
        assert_eq!(provider.timeout_secs, 120);
        assert_eq!(provider.model, "llama3.1:8b");
    }

    #[test]
    fn trims_trailing_slash() {
        let provider = OllamaProvider::new("http://localhost:11434/", "m", 60).unwrap();
        assert_eq!(provider.base_url, "http://localhost:11434");
    }

    #[test]
    fn request_body_carries_token_budget() {
        let body = OllamaGenerateRequest {
            model: "m",
            prompt: "p",
            stream: false,
            options: OllamaOptions {
                num_predict: 1200,
                temperature: 0.3,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["options"]["num_predict"], 1200);
        assert_eq!(json["stream"], false);
    }

    #[tokio::test]
    async fn unreachable_backend_is_not_configuration_error() {
        // Port 9 (discard) is closed on test hosts.
        let provider = OllamaProvider::new("http://127.0.0.1:9", "m", 2).unwrap();
        let err = provider
            .generate("hello", GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(!err.is_configuration());
    }
}
