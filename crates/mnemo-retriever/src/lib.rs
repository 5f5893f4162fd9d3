//! The hybrid retrieval pipeline: fuses vector and lexical search results,
//! reranks with a cross-encoder when available, applies recency/importance/
//! length/time-decay post-processing, and diversifies with MMR. See
//! `retriever` module docs for the full pipeline.

mod config;
mod retriever;
mod types;

pub use config::{RetrievalConfig, RetrievalMode};
pub use retriever::Retriever;
pub use types::{RankedResult, RetrievalContext};
