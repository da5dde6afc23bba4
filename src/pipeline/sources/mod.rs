pub mod aggregator;
pub mod reference;
pub mod types;

pub use aggregator::{filter_by_domain_rules, is_trusted_domain, SourceAggregator, TRUSTED_DOMAINS};
pub use reference::{ReferenceLookup, StaticLookup, WikipediaLookup};
pub use types::*;

use thiserror::Error;

/// Reference-lookup failures. Logged by the aggregator and never surfaced.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Reference service request failed: {0}")]
    Http(String),

    #[error("Reference service returned status {0}")]
    Status(u16),

    #[error("Reference service response could not be decoded: {0}")]
    Decode(String),
}
