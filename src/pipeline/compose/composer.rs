use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::Instrument;

use super::length::LengthPlan;
use super::parser::decode_outline;
use super::prompt::{
    build_plan_prompt, build_section_prompt, build_single_pass_prompt, section_placeholder,
};
use super::types::{
    Composition, CompositionRequest, CompositionStats, GeneratedDocument, GeneratedSection,
    GenerationMode, SectionPlan,
};
use super::{decode_document, ComposeError};
use crate::config::GenerationConfig;
use crate::llm::{GenerationOptions, LlmError, TextGenerationProvider};

/// Chars of the query kept in fallback titles.
const FALLBACK_TITLE_CHARS: usize = 50;

/// Token and concurrency limits for one composer.
#[derive(Debug, Clone, Copy)]
pub struct ComposerLimits {
    pub temperature: f32,
    pub max_tokens_cap: u32,
    pub section_max_tokens_cap: u32,
    pub plan_max_tokens: u32,
    pub section_concurrency: usize,
}

impl ComposerLimits {
    pub fn from_config(config: &GenerationConfig, section_concurrency: usize) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens_cap: config.max_tokens_cap,
            section_max_tokens_cap: config.section_max_tokens_cap,
            plan_max_tokens: config.plan_max_tokens,
            section_concurrency: section_concurrency.max(1),
        }
    }
}

impl Default for ComposerLimits {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default(), 3)
    }
}

/// Drives the generation backend to write a document from evidence.
pub struct DocumentComposer {
    provider: Arc<dyn TextGenerationProvider>,
    limits: ComposerLimits,
}

impl DocumentComposer {
    pub fn new(provider: Arc<dyn TextGenerationProvider>, limits: ComposerLimits) -> Self {
        Self { provider, limits }
    }

    /// Write the document with the plan's strategy.
    ///
    /// Content-level failures come back as a degraded composition. Only
    /// credential failures are returned as errors.
    pub async fn compose(
        &self,
        request: &CompositionRequest<'_>,
        plan: &LengthPlan,
    ) -> Result<Composition, ComposeError> {
        let outcome = if plan.is_multi_pass() {
            self.compose_multi_pass(request, plan).await
        } else {
            self.compose_single_pass(request, plan).await
        };

        match outcome {
            Ok(composition) => Ok(composition),
            Err(e) if e.is_configuration() => Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Generation failed; returning fallback document");
                Ok(degraded_composition(request.query, &e))
            }
        }
    }

    pub fn single_pass_max_tokens(&self, plan: &LengthPlan) -> u32 {
        budget(plan.max_words, self.limits.max_tokens_cap)
    }

    pub fn section_max_tokens(&self, plan: &LengthPlan) -> u32 {
        budget(plan.words_per_section, self.limits.section_max_tokens_cap)
    }

    fn options(&self, max_tokens: u32) -> GenerationOptions {
        GenerationOptions {
            max_tokens,
            temperature: self.limits.temperature,
        }
    }

    async fn compose_single_pass(
        &self,
        request: &CompositionRequest<'_>,
        plan: &LengthPlan,
    ) -> Result<Composition, ComposeError> {
        let prompt = build_single_pass_prompt(request, plan);
        let max_tokens = self.single_pass_max_tokens(plan);
        tracing::info!(
            provider = self.provider.name(),
            max_tokens,
            evidence = request.evidence.len(),
            "Single-pass generation"
        );

        let response = self.provider.generate(&prompt, self.options(max_tokens)).await?;
        let document = decode_document(&response)?;
        tracing::info!(sections = document.sections.len(), "Document generated");

        Ok(Composition {
            document,
            mode: GenerationMode::Ai,
            notice: None,
            stats: None,
        })
    }

    async fn compose_multi_pass(
        &self,
        request: &CompositionRequest<'_>,
        plan: &LengthPlan,
    ) -> Result<Composition, ComposeError> {
        let (title, outline) = self.plan_sections(request, plan).await?;
        tracing::info!(sections = outline.len(), "Multi-pass generation");

        let outline = &outline;
        let written: Vec<Result<GeneratedSection, LlmError>> = stream::iter(0..outline.len())
            .map(move |index| {
                let span = tracing::info_span!("section", index = index + 1, total = outline.len());
                self.write_section(request, plan, outline, index)
                    .instrument(span)
            })
            .buffered(self.limits.section_concurrency)
            .collect()
            .await;
        let sections = written.into_iter().collect::<Result<Vec<_>, _>>()?;

        let stats = CompositionStats::from_sections(&sections);
        tracing::info!(
            total_words = stats.total_words,
            sections = stats.sections,
            estimated_pages = stats.estimated_pages,
            "Long document generated"
        );

        Ok(Composition {
            document: GeneratedDocument { title, sections },
            mode: GenerationMode::Ai,
            notice: None,
            stats: Some(stats),
        })
    }

    /// Outline within `[min_sections, max_sections]`. A failed or empty
    /// outline becomes `min_sections` generic parts.
    pub async fn plan_sections(
        &self,
        request: &CompositionRequest<'_>,
        plan: &LengthPlan,
    ) -> Result<(String, Vec<SectionPlan>), ComposeError> {
        let prompt = build_plan_prompt(request, plan);
        let decoded = match self
            .provider
            .generate(&prompt, self.options(self.limits.plan_max_tokens))
            .await
        {
            Ok(response) => decode_outline(&response).map_err(ComposeError::from),
            Err(e) if e.is_configuration() => return Err(e.into()),
            Err(e) => Err(e.into()),
        };

        let (title, mut titles) = match decoded {
            Ok(outline) => (
                outline
                    .title
                    .unwrap_or_else(|| fallback_plan_title(request.query)),
                outline.sections,
            ),
            Err(e) => {
                tracing::warn!(error = %e, "Outline generation failed; using generic parts");
                let parts = (1..=plan.min_sections)
                    .map(|i| SectionPlan::new(format!("Part {i}")))
                    .collect();
                return Ok((fallback_plan_title(request.query), parts));
            }
        };

        while titles.len() < plan.min_sections {
            titles.push(format!("Further development {}", titles.len() + 1));
        }
        titles.truncate(plan.max_sections);
        Ok((title, titles.into_iter().map(SectionPlan::new).collect()))
    }

    /// One section; any non-credential failure becomes a placeholder paragraph.
    async fn write_section(
        &self,
        request: &CompositionRequest<'_>,
        plan: &LengthPlan,
        outline: &[SectionPlan],
        index: usize,
    ) -> Result<GeneratedSection, LlmError> {
        let title = outline[index].title.clone();
        let prompt = build_section_prompt(request, plan, outline, index);
        let options = self.options(self.section_max_tokens(plan));

        let content = match self.provider.generate(&prompt, options).await {
            Ok(text) if !text.trim().is_empty() => {
                let text = text.trim().to_string();
                tracing::debug!(words = text.split_whitespace().count(), "Section written");
                text
            }
            Ok(_) => {
                tracing::warn!(section = %title, "Empty section; using placeholder");
                section_placeholder(&title, request.query)
            }
            Err(e) if e.is_configuration() => return Err(e),
            Err(e) => {
                tracing::warn!(section = %title, error = %e, "Section generation failed; using placeholder");
                section_placeholder(&title, request.query)
            }
        };
        Ok(GeneratedSection { title, content })
    }
}

fn budget(words: usize, cap: u32) -> u32 {
    u32::try_from(words.saturating_mul(2)).unwrap_or(u32::MAX).min(cap)
}

fn query_prefix(query: &str) -> String {
    query.trim().chars().take(FALLBACK_TITLE_CHARS).collect()
}

fn fallback_plan_title(query: &str) -> String {
    format!("Document on {}", query_prefix(query))
}

/// Clearly marked stand-in when no AI-written document could be produced.
pub fn degraded_composition(query: &str, cause: &dyn std::fmt::Display) -> Composition {
    Composition {
        document: GeneratedDocument {
            title: format!("Document - {}", query_prefix(query)),
            sections: vec![GeneratedSection {
                title: "Information".to_string(),
                content: format!(
                    "The document requested for \"{}\" could not be generated automatically. \
                     Please try again or refine the request.",
                    query.trim()
                ),
            }],
        },
        mode: GenerationMode::Degraded,
        notice: Some(format!("Generation error: {cause}")),
        stats: None,
    }
}
