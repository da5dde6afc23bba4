pub mod compose;
pub mod evidence;
pub mod keywords;
pub mod orchestrator;
pub mod sources;

pub use orchestrator::{
    DocumentRequest, GroundedDocumentPipeline, GroundedDocumentResult, PipelineError, SourcesUsed,
};
