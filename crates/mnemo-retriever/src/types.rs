use mnemo_core::record::{Category, MemoryRecord};
use mnemo_storage::ScopeFilter;

/// The input to `Retriever::retrieve` (spec §4.3 `context`).
#[derive(Debug, Clone)]
pub struct RetrievalContext {
    pub query: String,
    /// Clamped to `[1, 20]` before use.
    pub limit: usize,
    pub scope_filter: Option<ScopeFilter>,
    pub category: Option<Category>,
}

impl RetrievalContext {
    #[must_use]
    pub fn new(query: impl Into<String>, limit: usize) -> Self {
        Self {
            query: query.into(),
            limit,
            scope_filter: None,
            category: None,
        }
    }

    #[must_use]
    pub(crate) fn clamped_limit(&self) -> usize {
        self.limit.clamp(1, 20)
    }
}

/// One record surviving the full pipeline, carrying its final blended
/// score plus the per-stage subscores a caller can use for explainability
/// (spec §4.6 `recall`'s "scoring provenance").
#[derive(Debug, Clone)]
pub struct RankedResult {
    pub record: MemoryRecord,
    pub score: f32,
    pub vector_score: Option<f32>,
    pub bm25_score: Option<f32>,
    pub reranker_score: Option<f32>,
}

/// A candidate mid-pipeline: the record plus every score computed for it
/// so far. Exists only inside the retriever; callers see `RankedResult`.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub record: MemoryRecord,
    pub fused: f32,
    pub vector_score: Option<f32>,
    pub bm25_score: Option<f32>,
    pub reranker_score: Option<f32>,
}

impl Candidate {
    pub(crate) fn into_ranked(self) -> RankedResult {
        RankedResult {
            record: self.record,
            score: self.fused,
            vector_score: self.vector_score,
            bm25_score: self.bm25_score,
            reranker_score: self.reranker_score,
        }
    }
}

pub(crate) fn category_matches(record: &MemoryRecord, category: Option<Category>) -> bool {
    match category {
        Some(c) => record.category == c,
        None => true,
    }
}
