use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use mnemo_core::error::MnemoError;
use mnemo_core::record::{Category, MemoryRecord, NewMemoryRecord, RecordId, MIN_PREFIX_LEN};
use mnemo_core::score::{cosine_similarity, normalize_bm25_raw};

use crate::traits::MemoryStore;
use crate::types::{ScopeFilter, SearchHit, StoreStats, UpdateFields};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Persisted {
    records: Vec<MemoryRecord>,
}

/// A single-file JSON-backed store, grounded on the append-and-rewrite
/// persistence style used by simple embedded stores in this lineage:
/// the whole record set lives in memory behind a lock and is rewritten to
/// disk on every mutation. Always has working full-text search, since its
/// BM25 scorer runs in-process rather than depending on an external index.
pub struct JsonFileStore {
    path: PathBuf,
    records: RwLock<Vec<MemoryRecord>>,
    configured_dim: usize,
}

impl JsonFileStore {
    /// Open (creating if absent) the JSON file at `path`. `configured_dim`
    /// is reported by `vector_dim()` until the first record is stored, at
    /// which point the store locks to that record's vector length.
    pub fn open(path: impl AsRef<Path>, configured_dim: usize) -> Result<Self, MnemoError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| MnemoError::EngineError(format!("create store dir: {e}")))?;
            }
        }

        if !path.exists() {
            let bytes = serde_json::to_vec_pretty(&Persisted::default())
                .map_err(|e| MnemoError::EngineError(format!("serialize empty store: {e}")))?;
            fs::write(&path, bytes)
                .map_err(|e| MnemoError::EngineError(format!("write store file: {e}")))?;
        }

        let bytes =
            fs::read(&path).map_err(|e| MnemoError::EngineError(format!("read store file: {e}")))?;
        let persisted: Persisted = serde_json::from_slice(&bytes)
            .map_err(|e| MnemoError::EngineError(format!("parse store file: {e}")))?;

        Ok(Self {
            path,
            records: RwLock::new(persisted.records),
            configured_dim,
        })
    }

    fn persist(&self, records: &[MemoryRecord]) -> Result<(), MnemoError> {
        let persisted = Persisted {
            records: records.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&persisted)
            .map_err(|e| MnemoError::EngineError(format!("serialize store: {e}")))?;
        fs::write(&self.path, bytes)
            .map_err(|e| MnemoError::EngineError(format!("write store file: {e}")))?;
        Ok(())
    }

    fn resolve_index(records: &[MemoryRecord], id_or_prefix: &str) -> Result<usize, MnemoError> {
        if let Ok(id) = RecordId::from_str(id_or_prefix) {
            return records
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| MnemoError::NotFound(id_or_prefix.to_string()));
        }

        if id_or_prefix.len() < MIN_PREFIX_LEN {
            return Err(MnemoError::InvalidInput(format!(
                "id prefix must be at least {MIN_PREFIX_LEN} hex characters"
            )));
        }

        let matches: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.id.matches_prefix(id_or_prefix))
            .map(|(i, _)| i)
            .collect();

        let n = matches.len();
        match n {
            0 => Err(MnemoError::NotFound(id_or_prefix.to_string())),
            1 => matches
                .into_iter()
                .next()
                .ok_or_else(|| MnemoError::NotFound(id_or_prefix.to_string())),
            _ => Err(MnemoError::AmbiguousPrefix {
                prefix: id_or_prefix.to_string(),
                matches: n,
            }),
        }
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn scope_allowed(scope: &str, filter: Option<&ScopeFilter>) -> bool {
    filter.is_none_or(|f| f.contains(scope))
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// BM25 (k1=1.2, b=0.75) raw score of `terms` against `text`, given the
/// corpus's average document length in tokens.
fn bm25_raw(text: &str, terms: &[String], avg_doc_len: f32) -> f32 {
    let doc_tokens = tokenize(text);
    if doc_tokens.is_empty() {
        return 0.0;
    }
    let doc_len = doc_tokens.len() as f32;
    let k1 = 1.2_f32;
    let b = 0.75_f32;

    let mut raw = 0.0_f32;
    for term in terms {
        let tf = doc_tokens.iter().filter(|t| *t == term).count() as f32;
        if tf <= 0.0 {
            continue;
        }
        let denom = tf + k1 * (1.0 - b + b * (doc_len / avg_doc_len.max(1.0)));
        raw += (tf * (k1 + 1.0)) / denom.max(1e-6);
    }
    raw
}

impl MemoryStore for JsonFileStore {
    fn store(&self, new: NewMemoryRecord) -> Result<MemoryRecord, MnemoError> {
        if new.text.trim().is_empty() {
            return Err(MnemoError::InvalidInput("text cannot be empty".to_string()));
        }

        let mut records = self.records.write();
        let expected_dim = records.first().map_or(self.configured_dim, |r| r.vector.len());
        if expected_dim != 0 && new.vector.len() != expected_dim {
            return Err(MnemoError::DimensionMismatch {
                expected: expected_dim,
                actual: new.vector.len(),
            });
        }

        let record = MemoryRecord {
            id: RecordId::new(),
            text: new.text,
            vector: new.vector,
            category: new.category,
            scope: new.scope,
            importance: MemoryRecord::normalize_importance(new.importance),
            timestamp: now_ms(),
            metadata: new.metadata,
        };

        records.push(record.clone());
        self.persist(&records)?;
        Ok(record)
    }

    fn import_entry(&self, record: MemoryRecord) -> Result<(), MnemoError> {
        let mut records = self.records.write();
        if let Some(existing) = records.iter().find(|r| r.id == record.id) {
            return Err(MnemoError::Duplicate {
                existing_id: existing.id,
                similarity: 1.0,
            });
        }

        let expected_dim = records.first().map_or(self.configured_dim, |r| r.vector.len());
        if expected_dim != 0 && record.vector.len() != expected_dim {
            return Err(MnemoError::DimensionMismatch {
                expected: expected_dim,
                actual: record.vector.len(),
            });
        }

        records.push(record);
        self.persist(&records)?;
        Ok(())
    }

    fn has_id(&self, id: RecordId) -> Result<bool, MnemoError> {
        Ok(self.records.read().iter().any(|r| r.id == id))
    }

    fn vector_search(
        &self,
        vector: &[f32],
        limit: usize,
        min_score: f32,
        scope_filter: Option<&ScopeFilter>,
    ) -> Result<Vec<SearchHit>, MnemoError> {
        let records = self.records.read();
        let mut hits: Vec<SearchHit> = records
            .iter()
            .filter(|r| scope_allowed(&r.scope, scope_filter))
            .filter_map(|r| {
                let cos = cosine_similarity(vector, &r.vector)?;
                let score = (cos + 1.0) / 2.0;
                (score >= min_score).then(|| SearchHit {
                    record: r.clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    fn bm25_search(
        &self,
        query: &str,
        limit: usize,
        scope_filter: Option<&ScopeFilter>,
    ) -> Result<Vec<SearchHit>, MnemoError> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let records = self.records.read();
        let candidates: Vec<&MemoryRecord> = records
            .iter()
            .filter(|r| scope_allowed(&r.scope, scope_filter))
            .collect();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let avg_doc_len = candidates
            .iter()
            .map(|r| tokenize(&r.text).len() as f32)
            .sum::<f32>()
            / candidates.len() as f32;

        let mut hits: Vec<SearchHit> = candidates
            .iter()
            .filter_map(|r| {
                let raw = bm25_raw(&r.text, &terms, avg_doc_len);
                (raw > 0.0).then(|| SearchHit {
                    record: (*r).clone(),
                    score: normalize_bm25_raw(Some(raw)),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    fn delete(
        &self,
        id_or_prefix: &str,
        scope_filter: Option<&ScopeFilter>,
    ) -> Result<RecordId, MnemoError> {
        let mut records = self.records.write();
        let idx = Self::resolve_index(&records, id_or_prefix)?;
        let scope = records
            .get(idx)
            .map(|r| r.scope.clone())
            .ok_or_else(|| MnemoError::EngineError("resolved index out of range".to_string()))?;
        if !scope_allowed(&scope, scope_filter) {
            return Err(MnemoError::ScopeDenied {
                scope,
                agent_id: "caller".to_string(),
            });
        }

        let removed = records.remove(idx);
        self.persist(&records)?;
        Ok(removed.id)
    }

    fn update(
        &self,
        id_or_prefix: &str,
        fields: UpdateFields,
        scope_filter: Option<&ScopeFilter>,
    ) -> Result<MemoryRecord, MnemoError> {
        let mut records = self.records.write();
        let idx = Self::resolve_index(&records, id_or_prefix)?;
        let scope = records
            .get(idx)
            .map(|r| r.scope.clone())
            .ok_or_else(|| MnemoError::EngineError("resolved index out of range".to_string()))?;
        if !scope_allowed(&scope, scope_filter) {
            return Err(MnemoError::ScopeDenied {
                scope,
                agent_id: "caller".to_string(),
            });
        }

        let expected_dim = records.first().map_or(self.configured_dim, |r| r.vector.len());
        if let Some(v) = &fields.vector {
            if expected_dim != 0 && v.len() != expected_dim {
                return Err(MnemoError::DimensionMismatch {
                    expected: expected_dim,
                    actual: v.len(),
                });
            }
        }

        let old = records.remove(idx);
        let updated = MemoryRecord {
            id: old.id,
            text: fields.text.unwrap_or(old.text),
            vector: fields.vector.unwrap_or(old.vector),
            category: fields.category.unwrap_or(old.category),
            scope: old.scope,
            importance: fields
                .importance
                .map_or(old.importance, MemoryRecord::normalize_importance),
            timestamp: old.timestamp,
            metadata: old.metadata,
        };

        records.push(updated.clone());
        self.persist(&records)?;
        Ok(updated)
    }

    fn list(
        &self,
        scope_filter: Option<&ScopeFilter>,
        category: Option<Category>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, MnemoError> {
        let records = self.records.read();
        let mut matching: Vec<&MemoryRecord> = records
            .iter()
            .filter(|r| scope_allowed(&r.scope, scope_filter))
            .filter(|r| category.is_none_or(|c| r.category == c))
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn stats(&self, scope_filter: Option<&ScopeFilter>) -> Result<StoreStats, MnemoError> {
        let records = self.records.read();
        let mut stats = StoreStats::default();
        for r in records.iter().filter(|r| scope_allowed(&r.scope, scope_filter)) {
            stats.total += 1;
            *stats.by_scope.entry(r.scope.clone()).or_insert(0) += 1;
            *stats.by_category.entry(r.category.to_string()).or_insert(0) += 1;
        }
        Ok(stats)
    }

    fn bulk_delete(
        &self,
        scope_filter: Option<&ScopeFilter>,
        before_timestamp_ms: Option<i64>,
    ) -> Result<usize, MnemoError> {
        if scope_filter.is_none() && before_timestamp_ms.is_none() {
            return Err(MnemoError::InvalidInput(
                "bulk_delete requires a scope filter or a before_timestamp bound".to_string(),
            ));
        }

        let mut records = self.records.write();
        let before = records.len();
        records.retain(|r| {
            let in_scope = scope_allowed(&r.scope, scope_filter);
            let in_time_range = before_timestamp_ms.is_none_or(|t| r.timestamp < t);
            !(in_scope && in_time_range)
        });
        let removed = before - records.len();
        if removed > 0 {
            self.persist(&records)?;
        }
        Ok(removed)
    }

    fn has_fts_support(&self) -> bool {
        true
    }

    fn vector_dim(&self) -> usize {
        self.records
            .read()
            .first()
            .map_or(self.configured_dim, |r| r.vector.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mnemo-json-store-test-{name}-{}.json", now_ms()))
    }

    fn sample(text: &str, vector: Vec<f32>, scope: &str) -> NewMemoryRecord {
        NewMemoryRecord {
            text: text.to_string(),
            vector,
            category: Category::Fact,
            scope: scope.to_string(),
            importance: 0.7,
            metadata: "{}".to_string(),
        }
    }

    #[test]
    fn store_then_find_by_vector_and_text() {
        let path = temp_path("roundtrip");
        let store = JsonFileStore::open(&path, 2).unwrap();

        let stored = store
            .store(sample("dark mode is preferred", vec![1.0, 0.0], "global"))
            .unwrap();

        let by_vector = store
            .vector_search(&[1.0, 0.0], 5, 0.0, None)
            .unwrap();
        assert_eq!(by_vector.first().unwrap().record.id, stored.id);

        let by_text = store.bm25_search("dark mode", 5, None).unwrap();
        assert_eq!(by_text.first().unwrap().record.id, stored.id);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn dimension_mismatch_on_second_store_is_rejected() {
        let path = temp_path("dimension");
        let store = JsonFileStore::open(&path, 0).unwrap();
        store.store(sample("first", vec![1.0, 0.0], "global")).unwrap();

        let err = store
            .store(sample("second", vec![1.0, 0.0, 0.0], "global"))
            .unwrap_err();
        assert!(matches!(err, MnemoError::DimensionMismatch { expected: 2, actual: 3 }));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn short_prefix_is_rejected_before_any_lookup() {
        let path = temp_path("short-prefix");
        let store = JsonFileStore::open(&path, 2).unwrap();
        store.store(sample("a", vec![1.0, 0.0], "global")).unwrap();

        let err = store
            .update("ab1234", UpdateFields::default(), None)
            .unwrap_err();
        assert!(matches!(err, MnemoError::InvalidInput(_)));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn unambiguous_prefix_resolves_to_the_matching_record() {
        let path = temp_path("unambiguous-prefix");
        let store = JsonFileStore::open(&path, 2).unwrap();
        let a = store.store(sample("a", vec![1.0, 0.0], "global")).unwrap();

        let prefix: String = a.id.to_string().chars().filter(|c| *c != '-').take(8).collect();
        let deleted = store.delete(&prefix, None).unwrap();
        assert_eq!(deleted, a.id);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn bulk_delete_requires_a_filter() {
        let path = temp_path("bulk");
        let store = JsonFileStore::open(&path, 2).unwrap();
        let err = store.bulk_delete(None, None).unwrap_err();
        assert!(matches!(err, MnemoError::InvalidInput(_)));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn bulk_delete_by_scope_removes_matching_records() {
        let path = temp_path("bulk-scope");
        let store = JsonFileStore::open(&path, 2).unwrap();
        store.store(sample("keep", vec![1.0, 0.0], "global")).unwrap();
        store.store(sample("drop", vec![0.0, 1.0], "scratch")).unwrap();

        let filter = ScopeFilter(vec!["scratch".to_string()]);
        let removed = store.bulk_delete(Some(&filter), None).unwrap();
        assert_eq!(removed, 1);

        let remaining = store.list(None, None, 0, 10).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining.first().unwrap().scope, "global");

        let _ = fs::remove_file(path);
    }

    #[test]
    fn update_preserves_id_and_timestamp() {
        let path = temp_path("update");
        let store = JsonFileStore::open(&path, 2).unwrap();
        let original = store.store(sample("before", vec![1.0, 0.0], "global")).unwrap();

        let updated = store
            .update(
                &original.id.to_string(),
                UpdateFields {
                    text: Some("after".to_string()),
                    ..Default::default()
                },
                None,
            )
            .unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.timestamp, original.timestamp);
        assert_eq!(updated.text, "after");

        let _ = fs::remove_file(path);
    }
}
