use super::chunker::WindowChunker;
use super::types::{Citation, EvidenceChunk, EvidencePassage, ScoredEvidence};
use crate::config::{ConfigError, PipelineConfig};
use crate::pipeline::keywords::{query_terms, MIN_SCORING_TERM_CHARS};
use crate::pipeline::sources::SourceDocument;

/// Extra weight per char a query term has beyond the scoring minimum.
const TERM_LENGTH_BONUS: f32 = 0.25;

/// Scores every passage of every source against a query and keeps the best.
///
/// `final = relevance_weight * L / (L + saturation) + reliability_weight * R`
/// where `L` is the raw lexical score and `R` the source reliability.
pub struct EvidenceSelector {
    chunker: WindowChunker,
    relevance_weight: f32,
    reliability_weight: f32,
    lexical_saturation: f32,
}

impl EvidenceSelector {
    pub fn new(config: &PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            chunker: WindowChunker::new(config.chunk_size, config.chunk_overlap)?,
            relevance_weight: config.relevance_weight,
            reliability_weight: config.reliability_weight,
            lexical_saturation: config.lexical_saturation,
        })
    }

    /// Top `top_k` passages with citation numbers 1..k in score order.
    /// An empty result means no passage shares a term with the query.
    pub fn select(
        &self,
        documents: &[SourceDocument],
        query: &str,
        top_k: usize,
    ) -> Vec<EvidencePassage> {
        let terms = query_terms(query);
        if terms.is_empty() {
            tracing::debug!("Query has no scoring terms");
            return Vec::new();
        }

        // Documents in order, chunks in offset order: the stable sort in
        // `rank` relies on this for its tie-break.
        let mut scored = Vec::new();
        let mut considered = 0usize;
        for doc in documents {
            for window in self.chunker.chunk_with_offsets(&doc.content) {
                considered += 1;
                let lexical = lexical_score(&window.text, &terms);
                if lexical <= 0.0 {
                    continue;
                }
                let reliability = doc.metadata.reliability_score;
                scored.push(ScoredEvidence {
                    final_score: self.final_score(lexical, reliability),
                    lexical_score: lexical,
                    reliability_score: reliability,
                    chunk: EvidenceChunk {
                        text: window.text,
                        source_id: doc.id.clone(),
                        char_offset: window.char_offset,
                        metadata: doc.metadata.clone(),
                    },
                });
            }
        }

        let selected = rank(scored, top_k);
        tracing::info!(
            chunks = considered,
            selected = selected.len(),
            top_k,
            "Evidence selected"
        );
        selected
    }

    pub fn final_score(&self, lexical: f32, reliability: f32) -> f32 {
        let relevance = lexical / (lexical + self.lexical_saturation);
        self.relevance_weight * relevance + self.reliability_weight * reliability
    }
}

/// Occurrence count of each query term in the lowercased text, weighted by
/// term length.
pub fn lexical_score(text: &str, terms: &[String]) -> f32 {
    let haystack = text.to_lowercase();
    terms
        .iter()
        .map(|term| {
            let occurrences = haystack.matches(term.as_str()).count();
            occurrences as f32 * term_weight(term)
        })
        .sum()
}

fn term_weight(term: &str) -> f32 {
    let extra = term.chars().count().saturating_sub(MIN_SCORING_TERM_CHARS);
    1.0 + extra as f32 * TERM_LENGTH_BONUS
}

/// Sort descending by final score, keep `top_k`, number from 1.
///
/// The sort is stable, so equal scores keep their input order.
pub fn rank(mut scored: Vec<ScoredEvidence>, top_k: usize) -> Vec<EvidencePassage> {
    scored.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
    scored.truncate(top_k);
    scored
        .into_iter()
        .enumerate()
        .map(|(i, evidence)| {
            let meta = &evidence.chunk.metadata;
            EvidencePassage {
                citation: Citation {
                    number: i + 1,
                    title: meta.title.clone(),
                    locator: meta.locator.clone(),
                    source_type: meta.source_type,
                    origin: meta.origin,
                    domain: meta.domain.clone(),
                    reliability_score: evidence.reliability_score,
                },
                evidence,
            }
        })
        .collect()
}
