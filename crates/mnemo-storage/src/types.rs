use std::collections::HashMap;

use mnemo_core::record::MemoryRecord;

/// A single candidate returned by `vector_search` or `bm25_search`, carrying
/// the full record and its per-source score on the `[0, 1]` scale used
/// throughout the retrieval pipeline (see `mnemo_core::score`).
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub record: MemoryRecord,
    pub score: f32,
}

/// An optional allow-list of scopes a query is restricted to. `None` means
/// no restriction (the caller is trusted, e.g. an internal maintenance
/// task); callers crossing a scope boundary apply `mnemo_core::scope`
/// checks before constructing this.
#[derive(Debug, Clone)]
pub struct ScopeFilter(pub Vec<String>);

impl ScopeFilter {
    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.0.iter().any(|s| s == scope)
    }
}

/// Fields an `update` call may change; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateFields {
    pub text: Option<String>,
    pub vector: Option<Vec<f32>>,
    pub importance: Option<f32>,
    pub category: Option<mnemo_core::record::Category>,
}

/// Aggregate counts returned by `stats`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub by_scope: HashMap<String, usize>,
    pub by_category: HashMap<String, usize>,
}
