pub mod config;
pub mod extract;
pub mod init;
pub mod llm;
pub mod pipeline;

pub use config::{GenerationConfig, PipelineConfig};
pub use pipeline::{DocumentRequest, GroundedDocumentPipeline, GroundedDocumentResult, PipelineError};
