use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a source came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrigin {
    Uploaded,
    External,
}

/// Editorial class of a source; drives its default reliability.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Academic,
    Institutional,
    MediaRecognized,
    Encyclopedia,
    Uploaded,
    Unknown,
}

impl SourceType {
    pub fn default_reliability(&self) -> f32 {
        match self {
            Self::Academic => 1.0,
            Self::Institutional => 0.95,
            Self::MediaRecognized => 0.8,
            Self::Encyclopedia => 0.7,
            Self::Uploaded => 0.85,
            Self::Unknown => 0.5,
        }
    }

    /// Label shown next to a reference in the rendered bibliography.
    pub fn display_label(&self) -> &'static str {
        match self {
            Self::Uploaded => "Provided document",
            Self::Encyclopedia => "Encyclopedia",
            Self::Academic => "Academic source",
            Self::Institutional => "Institutional source",
            Self::MediaRecognized | Self::Unknown => "Web source",
        }
    }
}

/// A URL for external material, a filename for uploads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceLocator {
    Url(String),
    Filename(String),
}

impl SourceLocator {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Url(s) | Self::Filename(s) => s,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceMetadata {
    pub origin: SourceOrigin,
    pub title: String,
    pub locator: SourceLocator,
    /// Trust weight in [0, 1].
    pub reliability_score: f32,
    pub source_type: SourceType,
    /// Registrable domain of external material (e.g. `wikipedia.org`).
    pub domain: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
}

/// One unit of candidate material, request-scoped and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceDocument {
    pub id: String,
    pub content: String,
    pub metadata: SourceMetadata,
}

/// An uploaded file after text extraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadedDoc {
    pub id: String,
    pub filename: String,
    pub extracted_text: String,
}

/// One result from the reference knowledge service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferenceHit {
    pub title: String,
    pub url: String,
    pub extract: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reliability_table_matches_source_classes() {
        assert_eq!(SourceType::Academic.default_reliability(), 1.0);
        assert_eq!(SourceType::Uploaded.default_reliability(), 0.85);
        assert_eq!(SourceType::Encyclopedia.default_reliability(), 0.7);
        assert_eq!(SourceType::Unknown.default_reliability(), 0.5);
        assert!(
            SourceType::Uploaded.default_reliability()
                > SourceType::Encyclopedia.default_reliability()
        );
    }

    #[test]
    fn locator_serializes_with_kind() {
        let json = serde_json::to_string(&SourceLocator::Filename("notes.txt".into())).unwrap();
        assert_eq!(json, r#"{"filename":"notes.txt"}"#);
        assert_eq!(SourceLocator::Url("https://x".into()).as_str(), "https://x");
    }
}
