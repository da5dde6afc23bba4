use std::env;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "grounded-docs";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "grounded_docs=info,warn"
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid chunk window: overlap {overlap} must be smaller than size {size}")]
    InvalidChunkWindow { size: usize, overlap: usize },

    #[error("{name} must be greater than zero")]
    ZeroValue { name: &'static str },

    #[error("{name} must be within [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f32 },

    #[error("Unknown generation provider: {0}")]
    UnknownProvider(String),

    #[error("Missing API key for provider {provider} (set {env_var})")]
    MissingApiKey {
        provider: &'static str,
        env_var: &'static str,
    },

    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },

    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),
}

// ═══════════════════════════════════════════════════════════
// Pipeline tuning
// ═══════════════════════════════════════════════════════════

/// Scoring weights, thresholds and retrieval bounds for one pipeline.
///
/// Passed into the selector, validator and aggregator at construction time;
/// nothing in the pipeline reads global tuning state.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub min_citations_per_section: usize,
    /// Below this many selected passages the request is reported as
    /// insufficient evidence instead of being generated.
    pub min_evidence: usize,
    pub relevance_weight: f32,
    pub reliability_weight: f32,
    /// Raw lexical score at which the normalized relevance reaches 0.5.
    pub lexical_saturation: f32,
    pub uploaded_reliability: f32,
    pub max_lookups: usize,
    pub results_per_lookup: usize,
    pub max_extract_chars: usize,
    pub lookup_concurrency: usize,
    pub section_concurrency: usize,
    pub reference_language: String,
    pub blocked_domains: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
            top_k: 15,
            min_citations_per_section: 2,
            min_evidence: 3,
            relevance_weight: 0.7,
            reliability_weight: 0.3,
            lexical_saturation: 4.0,
            uploaded_reliability: 0.85,
            max_lookups: 3,
            results_per_lookup: 3,
            max_extract_chars: 4000,
            lookup_concurrency: 3,
            section_concurrency: 3,
            reference_language: "fr".to_string(),
            blocked_domains: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by `GROUNDED_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            chunk_size: env_parse("GROUNDED_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: env_parse("GROUNDED_CHUNK_OVERLAP", defaults.chunk_overlap)?,
            top_k: env_parse("GROUNDED_TOP_K", defaults.top_k)?,
            min_citations_per_section: env_parse(
                "GROUNDED_MIN_CITATIONS_PER_SECTION",
                defaults.min_citations_per_section,
            )?,
            min_evidence: env_parse("GROUNDED_MIN_EVIDENCE", defaults.min_evidence)?,
            relevance_weight: env_parse("GROUNDED_RELEVANCE_WEIGHT", defaults.relevance_weight)?,
            reliability_weight: env_parse(
                "GROUNDED_RELIABILITY_WEIGHT",
                defaults.reliability_weight,
            )?,
            lexical_saturation: env_parse(
                "GROUNDED_LEXICAL_SATURATION",
                defaults.lexical_saturation,
            )?,
            uploaded_reliability: env_parse(
                "GROUNDED_UPLOADED_RELIABILITY",
                defaults.uploaded_reliability,
            )?,
            max_lookups: env_parse("GROUNDED_MAX_LOOKUPS", defaults.max_lookups)?,
            results_per_lookup: env_parse(
                "GROUNDED_RESULTS_PER_LOOKUP",
                defaults.results_per_lookup,
            )?,
            max_extract_chars: env_parse("GROUNDED_MAX_EXTRACT_CHARS", defaults.max_extract_chars)?,
            lookup_concurrency: env_parse(
                "GROUNDED_LOOKUP_CONCURRENCY",
                defaults.lookup_concurrency,
            )?,
            section_concurrency: env_parse(
                "GROUNDED_SECTION_CONCURRENCY",
                defaults.section_concurrency,
            )?,
            reference_language: env::var("GROUNDED_REFERENCE_LANGUAGE")
                .unwrap_or(defaults.reference_language),
            blocked_domains: env::var("GROUNDED_BLOCKED_DOMAINS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.blocked_domains),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroValue { name: "chunk_size" });
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidChunkWindow {
                size: self.chunk_size,
                overlap: self.chunk_overlap,
            });
        }
        if self.top_k == 0 {
            return Err(ConfigError::ZeroValue { name: "top_k" });
        }
        if self.lexical_saturation <= 0.0 {
            return Err(ConfigError::ZeroValue {
                name: "lexical_saturation",
            });
        }
        if self.lookup_concurrency == 0 {
            return Err(ConfigError::ZeroValue {
                name: "lookup_concurrency",
            });
        }
        if self.section_concurrency == 0 {
            return Err(ConfigError::ZeroValue {
                name: "section_concurrency",
            });
        }
        for (name, value) in [
            ("relevance_weight", self.relevance_weight),
            ("reliability_weight", self.reliability_weight),
            ("uploaded_reliability", self.uploaded_reliability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange { name, value });
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Generation backend
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Ollama,
    Anthropic,
    /// Deterministic offline backend; useful for dry runs of the pipeline.
    Mock,
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "mock" => Ok(Self::Mock),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens_cap: u32,
    pub section_max_tokens_cap: u32,
    pub plan_max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            model: "llama3.1:8b".to_string(),
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            timeout_secs: 300,
            temperature: 0.3,
            max_tokens_cap: 8000,
            section_max_tokens_cap: 4000,
            plan_max_tokens: 1000,
        }
    }
}

impl GenerationConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let provider = match env::var("GROUNDED_PROVIDER") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.provider,
        };
        let (model, base_url) = match provider {
            ProviderKind::Anthropic => (
                "claude-3-5-sonnet-20241022".to_string(),
                "https://api.anthropic.com".to_string(),
            ),
            _ => (defaults.model, defaults.base_url),
        };
        Ok(Self {
            provider,
            model: env::var("GROUNDED_MODEL").unwrap_or(model),
            base_url: env::var("GROUNDED_BASE_URL").unwrap_or(base_url),
            api_key: env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            timeout_secs: env_parse("GROUNDED_TIMEOUT_SECS", defaults.timeout_secs)?,
            temperature: env_parse("GROUNDED_TEMPERATURE", defaults.temperature)?,
            max_tokens_cap: env_parse("GROUNDED_MAX_TOKENS", defaults.max_tokens_cap)?,
            section_max_tokens_cap: env_parse(
                "GROUNDED_SECTION_MAX_TOKENS",
                defaults.section_max_tokens_cap,
            )?,
            plan_max_tokens: env_parse("GROUNDED_PLAN_MAX_TOKENS", defaults.plan_max_tokens)?,
        })
    }
}

fn env_parse<T: FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            var: var.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunk_size, 800);
        assert_eq!(config.chunk_overlap, 100);
        assert_eq!(config.top_k, 15);
        assert_eq!(config.min_citations_per_section, 2);
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let config = PipelineConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..PipelineConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidChunkWindow {
                size: 100,
                overlap: 100
            })
        );
    }

    #[test]
    fn zero_top_k_rejected() {
        let config = PipelineConfig {
            top_k: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroValue { name: "top_k" })
        ));
    }

    #[test]
    fn weights_outside_unit_range_rejected() {
        let config = PipelineConfig {
            reliability_weight: 1.5,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfUnitRange { .. })
        ));
    }

    #[test]
    fn provider_kind_parses_aliases() {
        assert_eq!("ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert_eq!("Claude".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert_eq!(" mock ".parse::<ProviderKind>().unwrap(), ProviderKind::Mock);
        assert!("gpt".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn split_list_normalizes_entries() {
        assert_eq!(
            split_list(" Example.com, ,spam.net "),
            vec!["example.com".to_string(), "spam.net".to_string()]
        );
    }

    #[test]
    fn app_name_is_stable() {
        assert_eq!(APP_NAME, "grounded-docs");
        assert!(!APP_VERSION.is_empty());
    }
}
