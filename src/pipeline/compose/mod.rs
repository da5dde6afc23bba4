pub mod composer;
pub mod length;
pub mod parser;
pub mod prompt;
pub mod types;

pub use composer::*;
pub use length::*;
pub use parser::{decode_document, decode_outline, lenient_extract, strict_parse, Outline, ParseError};
pub use types::*;

use thiserror::Error;

use crate::llm::LlmError;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("Malformed generation output: {0}")]
    Malformed(#[from] ParseError),
}

impl ComposeError {
    /// Credential problems; everything else degrades.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Generation(e) if e.is_configuration())
    }
}
