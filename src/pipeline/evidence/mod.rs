pub mod chunker;
pub mod citation;
pub mod selector;
pub mod types;

pub use chunker::{chunk, TextWindow, WindowChunker};
pub use citation::{count_citation_markers, format_citations_for_display, CitationValidator};
pub use selector::{lexical_score, rank, EvidenceSelector};
pub use types::*;
