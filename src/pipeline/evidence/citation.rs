use std::sync::LazyLock;

use regex::Regex;

use super::types::{
    Citation, DisplayCitation, FormattedCitations, ValidationIssue, ValidationReport,
};
use crate::pipeline::compose::GeneratedSection;
use crate::pipeline::sources::{is_trusted_domain, SourceOrigin, SourceType};

static CITATION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d+\]").expect("valid citation regex"));

/// Number of `[n]` markers in `text`.
pub fn count_citation_markers(text: &str) -> usize {
    CITATION_MARKER.find_iter(text).count()
}

/// Advisory citation-density check. Never modifies or rejects a document.
#[derive(Debug, Clone, Copy)]
pub struct CitationValidator {
    min_citations_per_section: usize,
}

impl CitationValidator {
    pub fn new(min_citations_per_section: usize) -> Self {
        Self {
            min_citations_per_section,
        }
    }

    pub fn validate(&self, sections: &[GeneratedSection]) -> ValidationReport {
        let issues: Vec<ValidationIssue> = sections
            .iter()
            .enumerate()
            .filter_map(|(index, section)| {
                let count = count_citation_markers(&section.content);
                (count < self.min_citations_per_section).then(|| ValidationIssue {
                    section_index: index,
                    section_title: section.title.clone(),
                    citation_count: count,
                    message: format!(
                        "Section \"{}\" has {} citation(s), expected at least {}",
                        section.title, count, self.min_citations_per_section
                    ),
                })
            })
            .collect();

        if !issues.is_empty() {
            tracing::warn!(
                issues = issues.len(),
                sections = sections.len(),
                "Citation density below threshold"
            );
        }

        ValidationReport {
            valid: issues.is_empty(),
            issues,
        }
    }
}

/// Bibliography for display: provided documents first, numbered from 1, then
/// web sources grouped by domain in first-seen order.
pub fn format_citations_for_display(
    citations: &[Citation],
    uploaded_filenames: &[String],
) -> FormattedCitations {
    let uploaded: Vec<DisplayCitation> = uploaded_filenames
        .iter()
        .enumerate()
        .map(|(i, filename)| DisplayCitation {
            number: i + 1,
            title: filename.clone(),
            url: None,
            domain: None,
            type_label: SourceType::Uploaded.display_label().to_string(),
            trusted: false,
        })
        .collect();

    let mut groups: Vec<(String, Vec<&Citation>)> = Vec::new();
    for citation in citations
        .iter()
        .filter(|c| c.origin == SourceOrigin::External)
    {
        let domain = citation.domain.clone().unwrap_or_else(|| "web".to_string());
        let locator = citation.locator.as_str();
        match groups.iter_mut().find(|(d, _)| *d == domain) {
            Some((_, members)) => {
                if !members.iter().any(|m| m.locator.as_str() == locator) {
                    members.push(citation);
                }
            }
            None => groups.push((domain, vec![citation])),
        }
    }

    let mut web = Vec::new();
    for (domain, members) in groups {
        for citation in members {
            web.push(DisplayCitation {
                number: uploaded.len() + web.len() + 1,
                title: citation.title.clone(),
                url: Some(citation.locator.as_str().to_string()),
                trusted: is_trusted_domain(&domain),
                domain: Some(domain.clone()),
                type_label: citation.source_type.display_label().to_string(),
            });
        }
    }

    FormattedCitations { uploaded, web }
}
