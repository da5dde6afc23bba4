use serde::{Deserialize, Serialize};

use crate::pipeline::sources::{SourceLocator, SourceMetadata, SourceOrigin, SourceType};

/// A fixed-size window of one source's text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceChunk {
    pub text: String,
    pub source_id: String,
    /// Start of the window in the source text, in chars.
    pub char_offset: usize,
    pub metadata: SourceMetadata,
}

/// A chunk with its ranking inputs and result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredEvidence {
    pub chunk: EvidenceChunk,
    pub lexical_score: f32,
    pub reliability_score: f32,
    pub final_score: f32,
}

/// Citation entry; `number` is the only identifier a document body may use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub number: usize,
    pub title: String,
    pub locator: SourceLocator,
    pub source_type: SourceType,
    pub origin: SourceOrigin,
    pub domain: Option<String>,
    pub reliability_score: f32,
}

/// A selected passage paired with the citation number assigned to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidencePassage {
    pub citation: Citation,
    pub evidence: ScoredEvidence,
}

impl EvidencePassage {
    pub fn number(&self) -> usize {
        self.citation.number
    }

    pub fn text(&self) -> &str {
        &self.evidence.chunk.text
    }
}

/// One section that fell below the citation threshold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationIssue {
    pub section_index: usize,
    pub section_title: String,
    pub citation_count: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

/// Bibliography entry for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayCitation {
    pub number: usize,
    pub title: String,
    pub url: Option<String>,
    pub domain: Option<String>,
    #[serde(rename = "type")]
    pub type_label: String,
    /// Web source from a recognized reference domain.
    pub trusted: bool,
}

/// Bibliography split into provided documents and web material.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FormattedCitations {
    pub uploaded: Vec<DisplayCitation>,
    pub web: Vec<DisplayCitation>,
}
