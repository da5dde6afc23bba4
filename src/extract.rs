use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Uploads larger than this are rejected.
pub const MAX_UPLOAD_BYTES: u64 = 2 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported file type: {0}")]
    Unsupported(String),

    #[error("File too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("File is not valid UTF-8 text: {0}")]
    Encoding(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExtractionMetadata {
    pub filename: String,
    pub file_type: String,
    pub bytes: u64,
    pub chars: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub metadata: ExtractionMetadata,
}

/// Turns an uploaded file into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path, file_type: &str) -> Result<ExtractedText, ExtractError>;
}

/// Lowercased extension, used as the file type when none is declared.
pub fn file_type_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

/// Reads `txt` and `md` files as UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

const PLAIN_TYPES: &[&str] = &["txt", "md", "markdown", "text/plain", "text/markdown"];

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, path: &Path, file_type: &str) -> Result<ExtractedText, ExtractError> {
        let file_type = file_type.trim().to_lowercase();
        if !PLAIN_TYPES.contains(&file_type.as_str()) {
            return Err(ExtractError::Unsupported(file_type));
        }

        let size = tokio::fs::metadata(path).await?.len();
        if size > MAX_UPLOAD_BYTES {
            return Err(ExtractError::TooLarge {
                size,
                max: MAX_UPLOAD_BYTES,
            });
        }

        let bytes = tokio::fs::read(path).await?;
        let text = String::from_utf8(bytes).map_err(|e| ExtractError::Encoding(e.to_string()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::debug!(file = %filename, bytes = size, "Text extracted");
        Ok(ExtractedText {
            metadata: ExtractionMetadata {
                filename,
                file_type,
                bytes: size,
                chars: text.chars().count(),
            },
            text,
        })
    }
}
