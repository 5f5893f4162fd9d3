use mnemo_core::error::MnemoError;
use mnemo_core::record::{Category, MemoryRecord, NewMemoryRecord, RecordId};

use crate::types::{ScopeFilter, SearchHit, StoreStats, UpdateFields};

/// The memory store contract: durable storage for `MemoryRecord`s with
/// vector ANN search, lexical full-text search, and id-addressed mutation.
///
/// Implementations own initialization (lazy, single-flighted on first
/// call) and are responsible for enforcing the dimension invariant: every
/// stored vector has the same length, fixed by whichever record is stored
/// first.
pub trait MemoryStore: Send + Sync {
    /// Insert a new record, assigning it a fresh id and the current
    /// timestamp. Does not perform duplicate detection; callers that need
    /// the near-duplicate contract run `vector_search` first.
    fn store(&self, new: NewMemoryRecord) -> Result<MemoryRecord, MnemoError>;

    /// Insert a fully-formed record (id, timestamp, vector already set),
    /// used by bulk import paths that must preserve an externally-assigned
    /// id. Fails with `MnemoError::Duplicate` if the id already exists.
    fn import_entry(&self, record: MemoryRecord) -> Result<(), MnemoError>;

    fn has_id(&self, id: RecordId) -> Result<bool, MnemoError>;

    /// Approximate nearest-neighbor search. Returns at most `limit` hits
    /// with `score >= min_score`, most similar first.
    fn vector_search(
        &self,
        vector: &[f32],
        limit: usize,
        min_score: f32,
        scope_filter: Option<&ScopeFilter>,
    ) -> Result<Vec<SearchHit>, MnemoError>;

    /// Full-text lexical search. Returns at most `limit` hits in engine
    /// order; callers normalize the raw score via
    /// `mnemo_core::score::normalize_bm25_raw`.
    fn bm25_search(
        &self,
        query: &str,
        limit: usize,
        scope_filter: Option<&ScopeFilter>,
    ) -> Result<Vec<SearchHit>, MnemoError>;

    /// Delete the record matching `id_or_prefix` (a full id or an unambiguous
    /// hex prefix of at least `mnemo_core::record::MIN_PREFIX_LEN`
    /// characters). Returns the deleted record's id.
    fn delete(
        &self,
        id_or_prefix: &str,
        scope_filter: Option<&ScopeFilter>,
    ) -> Result<RecordId, MnemoError>;

    /// Replace fields on the record matching `id_or_prefix`, preserving its
    /// id and original timestamp. Implemented as delete-then-insert so
    /// readers see either the old or the new record, never a partial one.
    fn update(
        &self,
        id_or_prefix: &str,
        fields: UpdateFields,
        scope_filter: Option<&ScopeFilter>,
    ) -> Result<MemoryRecord, MnemoError>;

    /// List records, most recent first, honoring an optional scope
    /// restriction and category filter.
    fn list(
        &self,
        scope_filter: Option<&ScopeFilter>,
        category: Option<Category>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, MnemoError>;

    fn stats(&self, scope_filter: Option<&ScopeFilter>) -> Result<StoreStats, MnemoError>;

    /// Delete every record matching the given filters. Requires at least
    /// one of `scope_filter` or `before_timestamp_ms` to avoid an
    /// accidental full wipe. Returns the number of records removed.
    fn bulk_delete(
        &self,
        scope_filter: Option<&ScopeFilter>,
        before_timestamp_ms: Option<i64>,
    ) -> Result<usize, MnemoError>;

    /// Whether this backend built a working full-text index. A store
    /// without FTS support still accepts `bm25_search` calls (returning
    /// empty results) but the retriever treats it as vector-only.
    fn has_fts_support(&self) -> bool;

    /// The vector dimension locked in by the first stored record, or the
    /// backend's configured dimension before any record exists.
    fn vector_dim(&self) -> usize;
}
