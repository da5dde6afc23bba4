use serde::{Deserialize, Serialize};

use crate::pipeline::evidence::EvidencePassage;

/// Attributes of the requester, surfaced to the writer as audience context.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub name: Option<String>,
    pub role: Option<String>,
    pub organization: Option<String>,
    pub profession: Option<String>,
    /// Field the document belongs to, e.g. "public health".
    pub domain: Option<String>,
    /// Level of expertise on the subject, e.g. "beginner".
    pub expertise: Option<String>,
    pub education: Option<String>,
    pub age: Option<String>,
    /// What the document is for, e.g. "teach a class".
    pub objective: Option<String>,
    /// Desired register, e.g. "formal" or "pedagogical".
    pub tone: Option<String>,
}

impl UserProfile {
    /// `(label, value)` pairs for the fields that are set.
    pub fn attributes(&self) -> Vec<(&'static str, &str)> {
        [
            ("Name", &self.name),
            ("Role", &self.role),
            ("Organization", &self.organization),
            ("Profession", &self.profession),
            ("Field", &self.domain),
            ("Expertise", &self.expertise),
            ("Education", &self.education),
            ("Age", &self.age),
            ("Objective", &self.objective),
            ("Tone", &self.tone),
        ]
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (label, v))
        })
        .collect()
    }
}

/// Answer to one clarifying question asked before generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefinementAnswer {
    pub question: String,
    pub answer: String,
}

/// Extracted text of one uploaded file, as handed to the writer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadedContent {
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratedSection {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratedDocument {
    pub title: String,
    pub sections: Vec<GeneratedSection>,
}

/// One planned section title (multi-pass only).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectionPlan {
    pub title: String,
}

impl SectionPlan {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Written by the generation backend.
    Ai,
    /// Synthetic fallback after a content-level failure.
    Degraded,
}

/// Size of a multi-pass document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompositionStats {
    pub total_words: usize,
    pub sections: usize,
    pub estimated_pages: usize,
}

/// Words per rendered page used for page estimates.
pub const WORDS_PER_PAGE: usize = 500;

impl CompositionStats {
    pub fn from_sections(sections: &[GeneratedSection]) -> Self {
        let total_words = sections
            .iter()
            .map(|s| s.content.split_whitespace().count())
            .sum::<usize>();
        Self {
            total_words,
            sections: sections.len(),
            estimated_pages: (total_words as f64 / WORDS_PER_PAGE as f64).round() as usize,
        }
    }
}

/// What the composer produced, before validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Composition {
    pub document: GeneratedDocument,
    pub mode: GenerationMode,
    pub notice: Option<String>,
    pub stats: Option<CompositionStats>,
}

/// Everything the writer sees for one request.
#[derive(Debug, Clone, Copy)]
pub struct CompositionRequest<'a> {
    pub query: &'a str,
    pub profile: &'a UserProfile,
    pub evidence: &'a [EvidencePassage],
    pub answers: &'a [RefinementAnswer],
    pub uploaded: &'a [UploadedContent],
}
