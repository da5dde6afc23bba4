use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use super::types::{GeneratedDocument, GeneratedSection};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    Json(String),

    #[error("No JSON object found in response")]
    NoJsonObject,

    #[error("Document has no title")]
    EmptyTitle,

    #[error("Document has no sections")]
    NoSections,
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    title: String,
    #[serde(default)]
    sections: Vec<RawSection>,
}

#[derive(Deserialize)]
struct RawSection {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct RawOutline {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    sections: Vec<OutlineEntry>,
}

/// Outline entries come back either as bare strings or as `{"title": ...}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum OutlineEntry {
    Title(String),
    Object { title: String },
}

/// Decoded planning response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outline {
    pub title: Option<String>,
    pub sections: Vec<String>,
}

/// Run decoders in order; the first success wins, otherwise the last error.
pub fn first_success<T>(
    text: &str,
    decoders: &[fn(&str) -> Result<T, ParseError>],
) -> Result<T, ParseError> {
    let mut last = ParseError::NoJsonObject;
    for decode in decoders {
        match decode(text) {
            Ok(value) => return Ok(value),
            Err(e) => last = e,
        }
    }
    Err(last)
}

/// Whole response must be the document JSON.
pub fn strict_parse(text: &str) -> Result<GeneratedDocument, ParseError> {
    let raw: RawDocument =
        serde_json::from_str(text.trim()).map_err(|e| ParseError::Json(e.to_string()))?;
    into_document(raw)
}

/// First balanced `{...}` in the response that holds a document.
pub fn lenient_extract(text: &str) -> Result<GeneratedDocument, ParseError> {
    extract_first_object(text, into_document)
}

pub fn decode_document(text: &str) -> Result<GeneratedDocument, ParseError> {
    first_success::<GeneratedDocument>(text, &[strict_parse, lenient_extract])
}

pub fn decode_outline(text: &str) -> Result<Outline, ParseError> {
    fn strict(text: &str) -> Result<Outline, ParseError> {
        let raw = serde_json::from_str(text.trim()).map_err(|e| ParseError::Json(e.to_string()))?;
        into_outline(raw)
    }
    fn lenient(text: &str) -> Result<Outline, ParseError> {
        extract_first_object(text, into_outline)
    }
    first_success::<Outline>(text, &[strict, lenient])
}

fn into_outline(raw: RawOutline) -> Result<Outline, ParseError> {
    let sections: Vec<String> = raw
        .sections
        .into_iter()
        .map(|entry| match entry {
            OutlineEntry::Title(t) | OutlineEntry::Object { title: t } => t.trim().to_string(),
        })
        .filter(|t| !t.is_empty())
        .collect();
    if sections.is_empty() {
        return Err(ParseError::NoSections);
    }
    Ok(Outline {
        title: raw
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()),
        sections,
    })
}

fn into_document(raw: RawDocument) -> Result<GeneratedDocument, ParseError> {
    let title = raw.title.trim().to_string();
    if title.is_empty() {
        return Err(ParseError::EmptyTitle);
    }
    let sections: Vec<GeneratedSection> = raw
        .sections
        .into_iter()
        .filter(|s| !(s.title.trim().is_empty() && s.content.trim().is_empty()))
        .map(|s| GeneratedSection {
            title: s.title.trim().to_string(),
            content: s.content.trim().to_string(),
        })
        .collect();
    if sections.is_empty() {
        return Err(ParseError::NoSections);
    }
    Ok(GeneratedDocument { title, sections })
}

/// Try each `{` as an object start; return the first balanced span that
/// deserializes as `T` and passes `accept`. On failure, reports why the
/// earliest candidate was rejected.
fn extract_first_object<T, U>(
    text: &str,
    accept: fn(T) -> Result<U, ParseError>,
) -> Result<U, ParseError>
where
    T: DeserializeOwned,
{
    let mut first_rejection = None;
    for (start, _) in text.match_indices('{') {
        let Some(end) = balanced_end(&text[start..]) else {
            continue;
        };
        let candidate = serde_json::from_str(&text[start..start + end])
            .map_err(|e| ParseError::Json(e.to_string()))
            .and_then(accept);
        match candidate {
            Ok(value) => return Ok(value),
            Err(e) => {
                first_rejection.get_or_insert(e);
            }
        }
    }
    Err(first_rejection.unwrap_or(ParseError::NoJsonObject))
}

/// Byte length of the balanced object at the start of `s`, ignoring braces
/// inside string literals.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
