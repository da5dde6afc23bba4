use std::sync::Arc;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use uuid::Uuid;

use super::reference::ReferenceLookup;
use super::types::{
    ReferenceHit, SourceDocument, SourceLocator, SourceMetadata, SourceOrigin, SourceType,
    UploadedDoc,
};
use crate::config::PipelineConfig;
use crate::pipeline::keywords::lookup_terms;

/// Domains whose material is considered trustworthy for display purposes.
/// Membership never affects filtering.
pub const TRUSTED_DOMAINS: &[&str] = &[
    "scholar.google.com",
    "pubmed.ncbi.nlm.nih.gov",
    "arxiv.org",
    "who.int",
    "cdc.gov",
    "nih.gov",
    "nasa.gov",
    "europa.eu",
    "un.org",
    "bbc.com",
    "nytimes.com",
    "reuters.com",
    "lemonde.fr",
    "wikipedia.org",
    "britannica.com",
];

pub fn is_trusted_domain(domain: &str) -> bool {
    TRUSTED_DOMAINS.iter().any(|d| domain_matches(domain, d))
}

/// Merges uploaded text and reference material into one ordered source list.
///
/// Uploaded documents come first in the caller's order, then external hits in
/// lookup order. That order feeds the selector's tie-break.
pub struct SourceAggregator {
    lookup: Option<Arc<dyn ReferenceLookup>>,
    config: PipelineConfig,
}

impl SourceAggregator {
    pub fn new(lookup: Option<Arc<dyn ReferenceLookup>>, config: PipelineConfig) -> Self {
        Self { lookup, config }
    }

    /// Aggregator that only ever returns uploaded material.
    pub fn uploads_only(config: PipelineConfig) -> Self {
        Self::new(None, config)
    }

    pub async fn aggregate(&self, query: &str, uploaded: &[UploadedDoc]) -> Vec<SourceDocument> {
        let mut documents: Vec<SourceDocument> = uploaded
            .iter()
            .map(|doc| self.uploaded_source(doc))
            .collect();

        let external = self.external_sources(query).await;
        tracing::info!(
            uploaded = documents.len(),
            external = external.len(),
            "Sources aggregated"
        );
        documents.extend(external);
        documents
    }

    fn uploaded_source(&self, doc: &UploadedDoc) -> SourceDocument {
        SourceDocument {
            id: doc.id.clone(),
            content: doc.extracted_text.clone(),
            metadata: SourceMetadata {
                origin: SourceOrigin::Uploaded,
                title: doc.filename.clone(),
                locator: SourceLocator::Filename(doc.filename.clone()),
                reliability_score: self.config.uploaded_reliability,
                source_type: SourceType::Uploaded,
                domain: None,
                fetched_at: None,
            },
        }
    }

    /// Lookup failures are logged and yield no documents.
    async fn external_sources(&self, query: &str) -> Vec<SourceDocument> {
        let Some(lookup) = self.lookup.as_ref() else {
            return Vec::new();
        };
        let terms = lookup_terms(query, self.config.max_lookups);
        if terms.is_empty() {
            tracing::debug!("No salient keywords; skipping reference lookups");
            return Vec::new();
        }

        let limit = self.config.results_per_lookup;
        let batches: Vec<Vec<ReferenceHit>> = stream::iter(terms)
            .map(|term| {
                let lookup = Arc::clone(lookup);
                async move {
                    match lookup.lookup(&term, limit).await {
                        Ok(hits) => {
                            tracing::debug!(term = %term, hits = hits.len(), "Reference lookup");
                            hits.into_iter().take(limit).collect()
                        }
                        Err(e) => {
                            tracing::warn!(term = %term, error = %e, "Reference lookup failed");
                            Vec::new()
                        }
                    }
                }
            })
            .buffered(self.config.lookup_concurrency.max(1))
            .collect()
            .await;

        let domain = lookup.domain().to_string();
        let mut seen_urls: Vec<String> = Vec::new();
        let mut documents = Vec::new();
        for hit in batches.into_iter().flatten() {
            if hit.extract.trim().is_empty() || seen_urls.contains(&hit.url) {
                continue;
            }
            seen_urls.push(hit.url.clone());
            documents.push(self.external_source(hit, &domain));
        }
        documents
    }

    fn external_source(&self, hit: ReferenceHit, domain: &str) -> SourceDocument {
        let source_type = SourceType::Encyclopedia;
        SourceDocument {
            id: Uuid::new_v4().to_string(),
            content: truncate_chars(&hit.extract, self.config.max_extract_chars),
            metadata: SourceMetadata {
                origin: SourceOrigin::External,
                title: hit.title,
                locator: SourceLocator::Url(hit.url),
                reliability_score: source_type.default_reliability(),
                source_type,
                domain: Some(domain.to_string()),
                fetched_at: Some(Utc::now()),
            },
        }
    }
}

/// Drop sources whose domain is denylisted. A source without a domain tag is
/// always kept.
pub fn filter_by_domain_rules(
    documents: Vec<SourceDocument>,
    blocked_domains: &[String],
) -> Vec<SourceDocument> {
    let before = documents.len();
    let kept: Vec<SourceDocument> = documents
        .into_iter()
        .filter(|doc| match doc.metadata.domain.as_deref() {
            None => true,
            Some(domain) => !blocked_domains.iter().any(|b| domain_matches(domain, b)),
        })
        .collect();
    if kept.len() < before {
        tracing::info!(removed = before - kept.len(), "Denylisted sources removed");
    }
    kept
}

/// `domain` equals `rule` or is a subdomain of it.
fn domain_matches(domain: &str, rule: &str) -> bool {
    let domain = domain.trim().to_lowercase();
    let rule = rule.trim().to_lowercase();
    !rule.is_empty() && (domain == rule || domain.ends_with(&format!(".{rule}")))
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::sources::reference::StaticLookup;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn hit(title: &str, extract: &str) -> ReferenceHit {
        ReferenceHit {
            title: title.into(),
            url: format!("https://fr.wikipedia.org/wiki/{title}"),
            extract: extract.into(),
        }
    }

    fn upload(id: &str, text: &str) -> UploadedDoc {
        UploadedDoc {
            id: id.into(),
            filename: format!("{id}.txt"),
            extracted_text: text.into(),
        }
    }

    fn external_doc(domain: Option<&str>) -> SourceDocument {
        SourceDocument {
            id: "x".into(),
            content: "text".into(),
            metadata: SourceMetadata {
                origin: SourceOrigin::External,
                title: "T".into(),
                locator: SourceLocator::Url("https://example.org".into()),
                reliability_score: 0.5,
                source_type: SourceType::Unknown,
                domain: domain.map(String::from),
                fetched_at: None,
            },
        }
    }

    #[tokio::test]
    async fn uploaded_first_then_external_in_lookup_order() {
        let lookup = StaticLookup::new()
            .with_hits("climat océans", vec![hit("Climat", "Le climat...")])
            .with_hits("océans", vec![hit("Océan", "Les océans...")]);
        let aggregator = SourceAggregator::new(Some(Arc::new(lookup)), PipelineConfig::default());

        let docs = aggregator
            .aggregate("climat et océans", &[upload("u1", "mon texte")])
            .await;

        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].metadata.origin, SourceOrigin::Uploaded);
        assert_eq!(docs[0].metadata.reliability_score, 0.85);
        assert_eq!(docs[1].metadata.title, "Climat");
        assert_eq!(docs[2].metadata.title, "Océan");
        assert_eq!(docs[1].metadata.domain.as_deref(), Some("wikipedia.org"));
        assert_eq!(docs[1].metadata.reliability_score, 0.7);
        assert!(docs[1].metadata.fetched_at.is_some());
    }

    #[tokio::test]
    async fn lookup_failure_keeps_uploaded_content() {
        let aggregator = SourceAggregator::new(
            Some(Arc::new(StaticLookup::unreachable())),
            PipelineConfig::default(),
        );
        let docs = aggregator
            .aggregate("impact de l'IA sur la santé", &[upload("u1", "texte")])
            .await;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "u1");
    }

    #[tokio::test]
    async fn extracts_are_truncated_and_results_bounded() {
        let long = "é".repeat(50);
        let lookup = StaticLookup::new().with_hits(
            "photosynthèse",
            vec![hit("A", &long), hit("B", &long), hit("C", &long)],
        );
        let config = PipelineConfig {
            max_extract_chars: 10,
            results_per_lookup: 2,
            ..PipelineConfig::default()
        };
        let aggregator = SourceAggregator::new(Some(Arc::new(lookup)), config);

        let docs = aggregator.aggregate("photosynthèse", &[]).await;
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content.chars().count(), 10);
    }

    #[tokio::test]
    async fn duplicate_pages_across_lookups_kept_once() {
        let lookup = StaticLookup::new()
            .with_hits("climat océans", vec![hit("Climat", "a")])
            .with_hits("climat", vec![hit("Climat", "a")]);
        let aggregator = SourceAggregator::new(Some(Arc::new(lookup)), PipelineConfig::default());
        let docs = aggregator.aggregate("climat océans", &[]).await;
        assert_eq!(docs.len(), 1);
    }

    /// Earlier calls take longer, so completions arrive in reverse order.
    #[derive(Default)]
    struct SlowFirstLookup {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ReferenceLookup for SlowFirstLookup {
        async fn lookup(
            &self,
            term: &str,
            _limit: usize,
        ) -> Result<Vec<ReferenceHit>, crate::pipeline::sources::RetrievalError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(60u64.saturating_sub(call as u64 * 10))).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![hit(term, "extrait")])
        }

        fn domain(&self) -> &str {
            "wikipedia.org"
        }
    }

    #[tokio::test]
    async fn external_order_follows_lookup_order_not_completion() {
        let query = "climat océans pollution biodiversité plastique";
        let config = PipelineConfig {
            max_lookups: 5,
            lookup_concurrency: 2,
            ..PipelineConfig::default()
        };
        let terms = lookup_terms(query, config.max_lookups);
        assert!(terms.len() >= 3);

        let lookup = Arc::new(SlowFirstLookup::default());
        let aggregator =
            SourceAggregator::new(Some(lookup.clone() as Arc<dyn ReferenceLookup>), config);
        let docs = aggregator.aggregate(query, &[]).await;

        let titles: Vec<&str> = docs.iter().map(|d| d.metadata.title.as_str()).collect();
        assert_eq!(titles, terms.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(lookup.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn uploads_only_never_looks_up() {
        let aggregator = SourceAggregator::uploads_only(PipelineConfig::default());
        let docs = aggregator.aggregate("anything at all", &[]).await;
        assert!(docs.is_empty());
    }

    #[test]
    fn domain_filter_keeps_untagged_sources() {
        let blocked = vec!["spam.net".to_string()];
        let docs = vec![
            external_doc(None),
            external_doc(Some("spam.net")),
            external_doc(Some("news.spam.net")),
            external_doc(Some("wikipedia.org")),
        ];
        let kept = filter_by_domain_rules(docs, &blocked);
        assert_eq!(kept.len(), 2);
        assert!(kept[0].metadata.domain.is_none());
        assert_eq!(kept[1].metadata.domain.as_deref(), Some("wikipedia.org"));
    }

    #[test]
    fn empty_denylist_keeps_everything() {
        let docs = vec![external_doc(Some("spam.net")), external_doc(None)];
        assert_eq!(filter_by_domain_rules(docs, &[]).len(), 2);
    }

    #[test]
    fn trusted_domains_include_subdomains() {
        assert!(is_trusted_domain("fr.wikipedia.org"));
        assert!(is_trusted_domain("who.int"));
        assert!(!is_trusted_domain("notwikipedia.org"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("santé publique", 5), "santé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
