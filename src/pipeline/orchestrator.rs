use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;

use super::compose::{
    length_preference_from_answers, ComposeError, ComposerLimits, CompositionRequest,
    CompositionStats, DocumentComposer, GeneratedDocument, GeneratedSection, GenerationMode,
    LengthPlan, LengthPlanner, RefinementAnswer, UploadedContent, UserProfile,
};
use super::evidence::{
    format_citations_for_display, Citation, CitationValidator, EvidencePassage, EvidenceSelector,
    FormattedCitations, ValidationReport,
};
use super::sources::{
    filter_by_domain_rules, ReferenceLookup, SourceAggregator, SourceDocument, SourceOrigin,
    UploadedDoc,
};
use crate::config::{ConfigError, GenerationConfig, PipelineConfig};
use crate::llm::{build_provider, TextGenerationProvider};

/// Failures that reach the caller. Content problems never do.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<ConfigError> for PipelineError {
    fn from(e: ConfigError) -> Self {
        Self::Configuration(e.to_string())
    }
}

/// Number of sources that fed a document.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct SourcesUsed {
    pub uploaded: usize,
    pub web: usize,
}

/// Outcome of one document request.
#[derive(Debug, Clone, Serialize)]
pub struct GroundedDocumentResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<GeneratedDocument>,
    pub citations: Vec<Citation>,
    pub formatted_citations: FormattedCitations,
    pub mode: GenerationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    pub sources_used: SourcesUsed,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<CompositionStats>,
}

/// Everything a caller supplies for one document.
#[derive(Debug, Clone, Default)]
pub struct DocumentRequest {
    pub query: String,
    pub profile: UserProfile,
    pub answers: Vec<RefinementAnswer>,
    pub uploaded: Vec<UploadedDoc>,
    /// Declared target length; read from `answers` when absent.
    pub length: Option<String>,
}

/// Retrieve, filter, select, plan, compose, validate.
pub struct GroundedDocumentPipeline {
    config: PipelineConfig,
    aggregator: SourceAggregator,
    selector: EvidenceSelector,
    planner: LengthPlanner,
    composer: DocumentComposer,
    validator: CitationValidator,
}

impl GroundedDocumentPipeline {
    pub fn new(
        config: PipelineConfig,
        provider: Arc<dyn TextGenerationProvider>,
        lookup: Option<Arc<dyn ReferenceLookup>>,
        limits: ComposerLimits,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            aggregator: SourceAggregator::new(lookup, config.clone()),
            selector: EvidenceSelector::new(&config)?,
            planner: LengthPlanner,
            composer: DocumentComposer::new(provider, limits),
            validator: CitationValidator::new(config.min_citations_per_section),
            config,
        })
    }

    /// Build the configured generation backend first; missing credentials
    /// fail here.
    pub fn from_config(
        config: PipelineConfig,
        generation: &GenerationConfig,
        lookup: Option<Arc<dyn ReferenceLookup>>,
    ) -> Result<Self, PipelineError> {
        let provider = build_provider(generation)?;
        let limits = ComposerLimits::from_config(generation, config.section_concurrency);
        Self::new(config, provider, lookup, limits)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn retrieve_documents(
        &self,
        query: &str,
        uploaded: &[UploadedDoc],
    ) -> Vec<SourceDocument> {
        self.aggregator.aggregate(query, uploaded).await
    }

    pub fn filter_by_domain_rules(&self, documents: Vec<SourceDocument>) -> Vec<SourceDocument> {
        filter_by_domain_rules(documents, &self.config.blocked_domains)
    }

    pub fn select_evidence(&self, documents: &[SourceDocument], query: &str) -> Vec<EvidencePassage> {
        self.selector.select(documents, query, self.config.top_k)
    }

    pub fn plan_length(&self, preference: Option<&str>, answers: &[RefinementAnswer]) -> LengthPlan {
        self.planner
            .plan(preference.or_else(|| length_preference_from_answers(answers)))
    }

    /// Compose a document from already selected evidence.
    pub async fn write_grounded_document(
        &self,
        query: &str,
        profile: &UserProfile,
        evidence: &[EvidencePassage],
        answers: &[RefinementAnswer],
        uploaded: &[UploadedContent],
        plan: &LengthPlan,
    ) -> Result<GroundedDocumentResult, PipelineError> {
        let request = CompositionRequest {
            query,
            profile,
            evidence,
            answers,
            uploaded,
        };
        let composition = self
            .composer
            .compose(&request, plan)
            .await
            .map_err(|e: ComposeError| PipelineError::Configuration(e.to_string()))?;

        let citations: Vec<Citation> = evidence.iter().map(|p| p.citation.clone()).collect();
        let filenames: Vec<String> = uploaded.iter().map(|u| u.filename.clone()).collect();
        let web = citations
            .iter()
            .filter(|c| c.origin == SourceOrigin::External)
            .count();

        Ok(GroundedDocumentResult {
            success: true,
            formatted_citations: format_citations_for_display(&citations, &filenames),
            citations,
            document: Some(composition.document),
            mode: composition.mode,
            notice: composition.notice,
            error: None,
            recommendations: Vec::new(),
            validation: None,
            sources_used: SourcesUsed {
                uploaded: uploaded.len(),
                web,
            },
            stats: composition.stats,
        })
    }

    pub fn validate_citations(&self, sections: &[GeneratedSection]) -> ValidationReport {
        self.validator.validate(sections)
    }

    /// Full request. Too little evidence yields a non-success result with
    /// recommendations rather than an error.
    pub async fn run(&self, request: &DocumentRequest) -> Result<GroundedDocumentResult, PipelineError> {
        let span = tracing::info_span!("grounded_document", uploads = request.uploaded.len());
        self.run_stages(request).instrument(span).await
    }

    async fn run_stages(
        &self,
        request: &DocumentRequest,
    ) -> Result<GroundedDocumentResult, PipelineError> {
        let documents = self
            .retrieve_documents(&request.query, &request.uploaded)
            .await;
        let documents = self.filter_by_domain_rules(documents);
        let evidence = self.select_evidence(&documents, &request.query);

        if evidence.len() < self.config.min_evidence {
            tracing::warn!(
                evidence = evidence.len(),
                required = self.config.min_evidence,
                "Insufficient evidence"
            );
            return Ok(insufficient_evidence(
                evidence.len(),
                self.config.min_evidence,
                request.uploaded.len(),
            ));
        }

        let plan = self.plan_length(request.length.as_deref(), &request.answers);
        tracing::info!(
            evidence = evidence.len(),
            length = %plan.display_label(),
            strategy = ?plan.strategy,
            "Composing document"
        );

        let uploaded: Vec<UploadedContent> = request
            .uploaded
            .iter()
            .map(|u| UploadedContent {
                filename: u.filename.clone(),
                content: u.extracted_text.clone(),
            })
            .collect();

        let mut result = self
            .write_grounded_document(
                &request.query,
                &request.profile,
                &evidence,
                &request.answers,
                &uploaded,
                &plan,
            )
            .await?;

        if let Some(document) = &result.document {
            result.validation = Some(self.validate_citations(&document.sections));
        }
        Ok(result)
    }
}

fn insufficient_evidence(found: usize, required: usize, uploads: usize) -> GroundedDocumentResult {
    let mut recommendations = Vec::new();
    if uploads == 0 {
        recommendations.push("Upload documents related to your topic".to_string());
    } else {
        recommendations.push("Upload more documents that cover your topic".to_string());
    }
    recommendations.push("Make the request more specific, naming key terms".to_string());
    recommendations.push("Rephrase the request using common vocabulary for the topic".to_string());

    GroundedDocumentResult {
        success: false,
        document: None,
        citations: Vec::new(),
        formatted_citations: FormattedCitations::default(),
        mode: GenerationMode::Degraded,
        notice: None,
        error: Some(format!(
            "Insufficient evidence: found {found} relevant passage(s), at least {required} required"
        )),
        recommendations,
        validation: None,
        sources_used: SourcesUsed::default(),
        stats: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GenerationOptions, LlmError, ScriptedProvider};
    use crate::pipeline::sources::{ReferenceHit, StaticLookup};

    fn upload(id: &str, text: &str) -> UploadedDoc {
        UploadedDoc {
            id: id.into(),
            filename: format!("{id}.txt"),
            extracted_text: text.into(),
        }
    }

    fn hit(title: &str, extract: &str) -> ReferenceHit {
        ReferenceHit {
            title: title.into(),
            url: format!("https://fr.wikipedia.org/wiki/{title}"),
            extract: extract.into(),
        }
    }

    fn pipeline(
        provider: Arc<dyn TextGenerationProvider>,
        lookup: Option<Arc<dyn ReferenceLookup>>,
    ) -> GroundedDocumentPipeline {
        GroundedDocumentPipeline::new(
            PipelineConfig::default(),
            provider,
            lookup,
            ComposerLimits::default(),
        )
        .unwrap()
    }

    fn climate_lookup() -> Arc<dyn ReferenceLookup> {
        Arc::new(
            StaticLookup::new()
                .with_hits(
                    "climat océans",
                    vec![
                        hit("Climat", "Le climat océanique dépend des courants. Les océans régulent le climat."),
                        hit("Océan", "Les océans couvrent la planète et absorbent la chaleur du climat."),
                    ],
                )
                .with_hits(
                    "climat",
                    vec![hit("Réchauffement", "Le réchauffement du climat affecte les océans.")],
                ),
        )
    }

    #[tokio::test]
    async fn scenario_single_upload_without_external_hits_is_insufficient() {
        let provider = Arc::new(ScriptedProvider::offline());
        let p = pipeline(provider.clone(), Some(Arc::new(StaticLookup::new())));
        let request = DocumentRequest {
            query: "impact de l'IA sur la santé".into(),
            uploaded: vec![upload("notes", "L'impact de l'IA sur la santé est important.")],
            ..DocumentRequest::default()
        };

        let result = p.run(&request).await.unwrap();

        assert!(!result.success);
        assert!(result.document.is_none());
        assert!(!result.recommendations.is_empty());
        assert!(result.error.unwrap().contains("Insufficient evidence"));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn lookup_outage_still_uses_uploaded_material() {
        let provider = Arc::new(ScriptedProvider::offline());
        let p = pipeline(provider, Some(Arc::new(StaticLookup::unreachable())));
        let text = "Le climat et les océans. ".repeat(120);
        let request = DocumentRequest {
            query: "climat et océans".into(),
            uploaded: vec![upload("rapport", &text)],
            ..DocumentRequest::default()
        };

        let result = p.run(&request).await.unwrap();
        assert!(result.success);
        assert_eq!(result.sources_used, SourcesUsed { uploaded: 1, web: 0 });
        assert!(result.citations.len() >= 3);
    }

    #[tokio::test]
    async fn full_run_numbers_citations_and_validates() {
        let provider = Arc::new(ScriptedProvider::new().with_reply(
            r#"{"title": "Climat et océans", "sections": [
                {"title": "Courants", "content": "Les courants [1] règlent le climat [2]."},
                {"title": "Chaleur", "content": "Absorption de chaleur [3]."}
            ]}"#,
        ));
        let p = pipeline(provider.clone(), Some(climate_lookup()));
        let request = DocumentRequest {
            query: "climat et océans".into(),
            length: Some("short".into()),
            ..DocumentRequest::default()
        };

        let result = p.run(&request).await.unwrap();

        assert!(result.success);
        assert_eq!(result.mode, GenerationMode::Ai);
        let numbers: Vec<usize> = result.citations.iter().map(|c| c.number).collect();
        assert_eq!(numbers, (1..=result.citations.len()).collect::<Vec<_>>());
        assert_eq!(result.sources_used.web, result.citations.len());
        assert!(!result.formatted_citations.web.is_empty());

        let validation = result.validation.unwrap();
        assert!(!validation.valid);
        assert_eq!(validation.issues.len(), 1);
        assert_eq!(validation.issues[0].section_title, "Chaleur");

        let prompt = &provider.prompts()[0];
        assert!(prompt.contains("[1] "));
        assert!(prompt.contains("Between 3 and 5 sections"));
    }

    #[tokio::test]
    async fn blocked_domains_are_removed_before_selection() {
        let config = PipelineConfig {
            blocked_domains: vec!["wikipedia.org".into()],
            ..PipelineConfig::default()
        };
        let p = GroundedDocumentPipeline::new(
            config,
            Arc::new(ScriptedProvider::offline()),
            Some(climate_lookup()),
            ComposerLimits::default(),
        )
        .unwrap();

        let docs = p.retrieve_documents("climat et océans", &[]).await;
        assert!(!docs.is_empty());
        assert!(p.filter_by_domain_rules(docs).is_empty());
    }

    #[tokio::test]
    async fn length_read_from_answers_switches_to_multi_pass() {
        let provider = Arc::new(ScriptedProvider::offline());
        let p = pipeline(provider.clone(), Some(climate_lookup()));
        let request = DocumentRequest {
            query: "climat et océans".into(),
            answers: vec![RefinementAnswer {
                question: "Combien de pages ?".into(),
                answer: "10 à 20 pages".into(),
            }],
            ..DocumentRequest::default()
        };

        let result = p.run(&request).await.unwrap();

        assert!(result.success);
        let stats = result.stats.unwrap();
        assert!(stats.sections >= 8 && stats.sections <= 15);
        assert_eq!(result.document.unwrap().sections.len(), stats.sections);
    }

    #[tokio::test]
    async fn degraded_generation_still_succeeds_with_notice() {
        let provider = Arc::new(ScriptedProvider::new().with_reply("not json at all"));
        let p = pipeline(provider, Some(climate_lookup()));
        let request = DocumentRequest {
            query: "climat et océans".into(),
            ..DocumentRequest::default()
        };

        let result = p.run(&request).await.unwrap();
        assert!(result.success);
        assert_eq!(result.mode, GenerationMode::Degraded);
        assert!(result.notice.unwrap().starts_with("Generation error:"));
        assert_eq!(result.document.unwrap().title, "Document - climat et océans");
    }

    #[tokio::test]
    async fn rejected_credentials_propagate_as_configuration_error() {
        struct Rejecting;

        #[async_trait::async_trait]
        impl TextGenerationProvider for Rejecting {
            async fn generate(
                &self,
                _prompt: &str,
                _options: GenerationOptions,
            ) -> Result<String, LlmError> {
                Err(LlmError::Unauthorized(403))
            }

            fn name(&self) -> &str {
                "rejecting"
            }
        }

        let p = pipeline(Arc::new(Rejecting), Some(climate_lookup()));
        let request = DocumentRequest {
            query: "climat et océans".into(),
            ..DocumentRequest::default()
        };
        assert!(matches!(
            p.run(&request).await,
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn missing_api_key_fails_at_construction() {
        let generation = GenerationConfig {
            provider: crate::config::ProviderKind::Anthropic,
            api_key: None,
            ..GenerationConfig::default()
        };
        let result = GroundedDocumentPipeline::from_config(PipelineConfig::default(), &generation, None);
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }
}
