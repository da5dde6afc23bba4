use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::types::ReferenceHit;
use super::RetrievalError;

/// Reference knowledge service (encyclopedia search).
#[async_trait]
pub trait ReferenceLookup: Send + Sync {
    /// At most `limit` hits for `term`, in relevance order.
    async fn lookup(&self, term: &str, limit: usize) -> Result<Vec<ReferenceHit>, RetrievalError>;

    /// Domain tag attached to every hit from this service.
    fn domain(&self) -> &str;
}

/// MediaWiki-backed lookup: one search call, then one batched intro-extract call.
pub struct WikipediaLookup {
    client: reqwest::Client,
    language: String,
    api_url: String,
}

impl WikipediaLookup {
    pub fn new(language: &str, timeout_secs: u64) -> Result<Self, RetrievalError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(concat!("grounded-docs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RetrievalError::Http(e.to_string()))?;
        Ok(Self {
            client,
            language: language.to_string(),
            api_url: format!("https://{language}.wikipedia.org/w/api.php"),
        })
    }

    fn page_url(&self, title: &str) -> String {
        format!(
            "https://{}.wikipedia.org/wiki/{}",
            self.language,
            title.replace(' ', "_")
        )
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<T, RetrievalError> {
        let response = self
            .client
            .get(&self.api_url)
            .query(params)
            .send()
            .await
            .map_err(|e| RetrievalError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::Status(status.as_u16()));
        }
        response
            .json()
            .await
            .map_err(|e| RetrievalError::Decode(e.to_string()))
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    pageid: u64,
}

#[derive(Deserialize)]
struct ExtractResponse {
    query: Option<ExtractQuery>,
}

#[derive(Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: HashMap<String, ExtractPage>,
}

#[derive(Deserialize)]
struct ExtractPage {
    pageid: Option<u64>,
    title: String,
    #[serde(default)]
    extract: String,
}

#[async_trait]
impl ReferenceLookup for WikipediaLookup {
    async fn lookup(&self, term: &str, limit: usize) -> Result<Vec<ReferenceHit>, RetrievalError> {
        let limit_str = limit.to_string();
        let search: SearchResponse = self
            .get_json(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", term),
                ("srlimit", &limit_str),
                ("format", "json"),
            ])
            .await?;

        let page_ids: Vec<u64> = search
            .query
            .map(|q| q.search.into_iter().take(limit).map(|r| r.pageid).collect())
            .unwrap_or_default();
        if page_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = page_ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join("|");
        let extracts: ExtractResponse = self
            .get_json(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("pageids", &ids),
                ("format", "json"),
            ])
            .await?;

        let mut pages = extracts.query.map(|q| q.pages).unwrap_or_default();
        // Keep search ranking; the pages map is unordered.
        let hits = page_ids
            .iter()
            .filter_map(|id| pages.remove(&id.to_string()))
            .filter(|p| p.pageid.is_some() && !p.extract.trim().is_empty())
            .map(|p| ReferenceHit {
                url: self.page_url(&p.title),
                title: p.title,
                extract: p.extract,
            })
            .collect();
        Ok(hits)
    }

    fn domain(&self) -> &str {
        "wikipedia.org"
    }
}

/// Fixed in-memory lookup keyed by term; used in tests and offline runs.
pub struct StaticLookup {
    entries: Vec<(String, Vec<ReferenceHit>)>,
    fail: bool,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            fail: false,
        }
    }

    /// Lookup whose every call fails as if the service were unreachable.
    pub fn unreachable() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn with_hits(mut self, term: &str, hits: Vec<ReferenceHit>) -> Self {
        self.entries.push((term.to_string(), hits));
        self
    }
}

impl Default for StaticLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReferenceLookup for StaticLookup {
    async fn lookup(&self, term: &str, limit: usize) -> Result<Vec<ReferenceHit>, RetrievalError> {
        if self.fail {
            return Err(RetrievalError::Http("connection refused".into()));
        }
        Ok(self
            .entries
            .iter()
            .find(|(t, _)| t == term)
            .map(|(_, hits)| hits.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn domain(&self) -> &str {
        "wikipedia.org"
    }
}
