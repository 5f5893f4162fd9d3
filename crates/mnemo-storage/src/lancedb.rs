//! LanceDB-backed store: an embedded columnar database with ANN search over
//! a `FixedSizeList<Float32>` vector column and a full-text index on `text`.
//!
//! Table initialization is lazy and single-flighted behind a lock: the
//! first call that needs the table either opens the existing one (reading
//! its vector dimension back out of the Arrow schema) or creates it from a
//! caller-supplied dimension. A probe row is inserted and removed
//! immediately afterward so the schema is locked in before any real record
//! lands, mirroring how the table would behave under concurrent writers.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use futures::TryStreamExt;
use lancedb::index::scalar::FtsIndexBuilder;
use lancedb::index::Index;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table};
use parking_lot::RwLock;

use mnemo_core::error::MnemoError;
use mnemo_core::record::{Category, MemoryRecord, NewMemoryRecord, RecordId, MIN_PREFIX_LEN};
use mnemo_core::score::{distance_to_similarity, normalize_bm25_raw};

use crate::traits::MemoryStore;
use crate::types::{ScopeFilter, SearchHit, StoreStats, UpdateFields};

const TABLE_NAME: &str = "memories";
const PROBE_ID: &str = "00000000-0000-0000-0000-000000000000";
const OVERFETCH_CAP: usize = 200;

#[derive(Clone)]
struct Inner {
    table: Table,
    dim: usize,
    fts_ready: bool,
}

pub struct LanceDbStore {
    rt: tokio::runtime::Runtime,
    uri: String,
    db: Connection,
    inner: RwLock<Option<Inner>>,
}

impl LanceDbStore {
    /// Connect to the database at `uri`. Does not open or create the table
    /// yet: that happens lazily on first use (see module docs).
    pub fn open(uri: impl Into<String>) -> Result<Self, MnemoError> {
        let uri = uri.into();
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| MnemoError::EngineError(format!("tokio runtime init failed: {e}")))?;
        let db = rt
            .block_on(async { lancedb::connect(&uri).execute().await })
            .map_err(|e| MnemoError::EngineError(format!("lancedb connect: {e}")))?;

        Ok(Self {
            rt,
            uri,
            db,
            inner: RwLock::new(None),
        })
    }

    fn current(&self) -> Option<Inner> {
        self.inner.read().clone()
    }

    async fn open_existing(&self) -> Result<Option<Inner>, MnemoError> {
        let table = match self.db.open_table(TABLE_NAME).execute().await {
            Ok(t) => t,
            Err(lancedb::Error::TableNotFound { .. }) => return Ok(None),
            Err(e) => return Err(MnemoError::EngineError(format!("lancedb open_table: {e}"))),
        };
        let dim = schema_vector_dim(&table).await?;
        let fts_ready = has_fts_index(&table).await;
        Ok(Some(Inner { table, dim, fts_ready }))
    }

    async fn create_table(&self, dim: usize) -> Result<Inner, MnemoError> {
        let table = self
            .db
            .create_empty_table(TABLE_NAME, schema_ref(dim))
            .execute()
            .await
            .map_err(|e| MnemoError::EngineError(format!("lancedb create_table: {e}")))?;

        let probe = probe_record(dim);
        let batch = record_to_batch(&probe, dim)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| MnemoError::EngineError(format!("lancedb probe insert: {e}")))?;
        table
            .delete(&format!("id = '{PROBE_ID}'"))
            .await
            .map_err(|e| MnemoError::EngineError(format!("lancedb probe delete: {e}")))?;

        let fts_ready = match table
            .create_index(&["text"], Index::FTS(FtsIndexBuilder::default()))
            .execute()
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "failed to build full-text index, falling back to vector-only retrieval");
                false
            }
        };

        Ok(Inner { table, dim, fts_ready })
    }

    /// Used by mutating operations: creates the table from `dim_hint` if it
    /// doesn't exist yet.
    fn ensure(&self, dim_hint: usize) -> Result<Inner, MnemoError> {
        if let Some(inner) = self.current() {
            return Ok(inner);
        }
        let mut guard = self.inner.write();
        if let Some(inner) = guard.clone() {
            return Ok(inner);
        }
        let existing = self.rt.block_on(self.open_existing())?;
        let inner = match existing {
            Some(inner) => inner,
            None => self.rt.block_on(self.create_table(dim_hint))?,
        };
        *guard = Some(inner.clone());
        Ok(inner)
    }

    /// Used by read-only operations: an absent table with nothing to create
    /// it from means "no records", not an error.
    fn ensure_for_read(&self) -> Result<Option<Inner>, MnemoError> {
        if let Some(inner) = self.current() {
            return Ok(Some(inner));
        }
        let mut guard = self.inner.write();
        if let Some(inner) = guard.clone() {
            return Ok(Some(inner));
        }
        let existing = self.rt.block_on(self.open_existing())?;
        if let Some(inner) = &existing {
            *guard = Some(inner.clone());
        }
        Ok(existing)
    }

    fn resolve_id(&self, table: &Table, id_or_prefix: &str) -> Result<RecordId, MnemoError> {
        use std::str::FromStr;

        if let Ok(id) = RecordId::from_str(id_or_prefix) {
            return Ok(id);
        }
        if id_or_prefix.len() < MIN_PREFIX_LEN {
            return Err(MnemoError::InvalidInput(format!(
                "id prefix must be at least {MIN_PREFIX_LEN} hex characters"
            )));
        }

        let predicate = format!("id_hex LIKE '{}%'", escape_sql(&id_or_prefix.to_ascii_lowercase()));
        let batches = self.rt.block_on(async {
            table
                .query()
                .only_if(predicate)
                .select(lancedb::query::Select::columns(&["id"]))
                .execute()
                .await?
                .try_collect::<Vec<RecordBatch>>()
                .await
        });
        let batches = batches.map_err(|e| MnemoError::EngineError(format!("lancedb prefix lookup: {e}")))?;

        let ids: Vec<RecordId> = batches
            .iter()
            .filter_map(|b| as_string(b, "id"))
            .flat_map(|a| (0..a.len()).map(|i| a.value(i).to_string()))
            .filter_map(|s| RecordId::from_str(&s).ok())
            .collect();

        match ids.len() {
            0 => Err(MnemoError::NotFound(id_or_prefix.to_string())),
            1 => ids
                .into_iter()
                .next()
                .ok_or_else(|| MnemoError::NotFound(id_or_prefix.to_string())),
            n => Err(MnemoError::AmbiguousPrefix {
                prefix: id_or_prefix.to_string(),
                matches: n,
            }),
        }
    }

    fn fetch_one(&self, table: &Table, id: RecordId) -> Result<Option<MemoryRecord>, MnemoError> {
        let predicate = format!("id = '{}'", escape_sql(&id.to_string()));
        let batches = self
            .rt
            .block_on(async {
                table
                    .query()
                    .only_if(predicate)
                    .limit(1)
                    .execute()
                    .await?
                    .try_collect::<Vec<RecordBatch>>()
                    .await
            })
            .map_err(|e| MnemoError::EngineError(format!("lancedb fetch: {e}")))?;
        Ok(parse_records(&batches).into_iter().next())
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn escape_sql(s: &str) -> String {
    s.replace('\'', "''")
}

fn scope_predicate(filter: Option<&ScopeFilter>) -> Option<String> {
    let filter = filter?;
    if filter.0.is_empty() {
        return Some("false".to_string());
    }
    let list = filter
        .0
        .iter()
        .map(|s| format!("'{}'", escape_sql(s)))
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!("scope IN ({list})"))
}

fn combine_predicates(preds: Vec<Option<String>>) -> Option<String> {
    let parts: Vec<String> = preds.into_iter().flatten().collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" AND "))
    }
}

fn schema_ref(dim: usize) -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("id_hex", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("category", DataType::Utf8, false),
        Field::new("scope", DataType::Utf8, false),
        Field::new("importance", DataType::Float32, false),
        Field::new("timestamp_ms", DataType::Int64, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dim as i32,
            ),
            false,
        ),
    ]))
}

async fn schema_vector_dim(table: &Table) -> Result<usize, MnemoError> {
    let schema = table
        .schema()
        .await
        .map_err(|e| MnemoError::EngineError(format!("lancedb schema: {e}")))?;
    let field = schema
        .field_with_name("vector")
        .map_err(|e| MnemoError::EngineError(format!("lancedb schema missing vector column: {e}")))?;
    match field.data_type() {
        DataType::FixedSizeList(_, size) => Ok((*size).max(0) as usize),
        other => Err(MnemoError::EngineError(format!(
            "lancedb vector column has unexpected type {other:?}"
        ))),
    }
}

async fn has_fts_index(table: &Table) -> bool {
    table
        .list_indices()
        .await
        .map(|indices| indices.iter().any(|idx| idx.columns.iter().any(|c| c == "text")))
        .unwrap_or(false)
}

fn probe_record(dim: usize) -> MemoryRecord {
    MemoryRecord {
        id: RecordId::new(),
        text: "schema-probe".to_string(),
        vector: vec![0.0; dim],
        category: Category::Other,
        scope: "global".to_string(),
        importance: 0.0,
        timestamp: 0,
        metadata: "{}".to_string(),
    }
    .with_probe_id()
}

trait WithProbeId {
    fn with_probe_id(self) -> Self;
}

impl WithProbeId for MemoryRecord {
    fn with_probe_id(mut self) -> Self {
        use std::str::FromStr;
        if let Ok(id) = RecordId::from_str(PROBE_ID) {
            self.id = id;
        }
        self
    }
}

fn record_to_batch(record: &MemoryRecord, dim: usize) -> Result<RecordBatch, MnemoError> {
    let id_hex: String = record.id.to_string().chars().filter(|c| *c != '-').collect();
    let values = Float32Array::from(record.vector.clone());
    let inner_field = Arc::new(Field::new("item", DataType::Float32, true));
    let vector = arrow_array::FixedSizeListArray::new(inner_field, dim as i32, Arc::new(values), None);

    RecordBatch::try_new(
        schema_ref(dim),
        vec![
            Arc::new(StringArray::from(vec![record.id.to_string()])),
            Arc::new(StringArray::from(vec![id_hex])),
            Arc::new(StringArray::from(vec![record.text.clone()])),
            Arc::new(StringArray::from(vec![record.category.to_string()])),
            Arc::new(StringArray::from(vec![record.scope.clone()])),
            Arc::new(Float32Array::from(vec![record.importance])),
            Arc::new(Int64Array::from(vec![record.timestamp])),
            Arc::new(StringArray::from(vec![record.metadata.clone()])),
            Arc::new(vector),
        ],
    )
    .map_err(|e| MnemoError::EngineError(format!("arrow record batch: {e}")))
}

fn as_string<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
}

fn as_f32<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a Float32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
}

fn as_i64<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a Int64Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
}

fn as_vector_list<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a FixedSizeListArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
}

fn row_vector(vectors: Option<&FixedSizeListArray>, i: usize) -> Vec<f32> {
    let Some(vectors) = vectors else {
        return Vec::new();
    };
    let Some(values) = vectors.value(i).as_any().downcast_ref::<Float32Array>().cloned() else {
        return Vec::new();
    };
    values.values().to_vec()
}

struct BatchColumns<'a> {
    ids: Option<&'a StringArray>,
    texts: Option<&'a StringArray>,
    categories: Option<&'a StringArray>,
    scopes: Option<&'a StringArray>,
    importances: Option<&'a Float32Array>,
    timestamps: Option<&'a Int64Array>,
    metadata: Option<&'a StringArray>,
    vectors: Option<&'a FixedSizeListArray>,
}

impl<'a> BatchColumns<'a> {
    fn of(batch: &'a RecordBatch) -> Self {
        Self {
            ids: as_string(batch, "id"),
            texts: as_string(batch, "text"),
            categories: as_string(batch, "category"),
            scopes: as_string(batch, "scope"),
            importances: as_f32(batch, "importance"),
            timestamps: as_i64(batch, "timestamp_ms"),
            metadata: as_string(batch, "metadata"),
            vectors: as_vector_list(batch, "vector"),
        }
    }

    fn record_at(&self, i: usize) -> Option<MemoryRecord> {
        use std::str::FromStr;

        let id = RecordId::from_str(self.ids?.value(i)).ok()?;
        Some(MemoryRecord {
            id,
            text: self.texts.map(|a| a.value(i).to_string()).unwrap_or_default(),
            vector: row_vector(self.vectors, i),
            category: self
                .categories
                .and_then(|a| a.value(i).parse::<Category>().ok())
                .unwrap_or(Category::Other),
            scope: self.scopes.map(|a| a.value(i).to_string()).unwrap_or_default(),
            importance: self.importances.map(|a| a.value(i)).unwrap_or(0.7),
            timestamp: self.timestamps.map(|a| a.value(i)).unwrap_or(0),
            metadata: self
                .metadata
                .map(|a| a.value(i).to_string())
                .unwrap_or_else(|| "{}".to_string()),
        })
    }
}

fn parse_records(batches: &[RecordBatch]) -> Vec<MemoryRecord> {
    let mut out = Vec::new();
    for batch in batches {
        let columns = BatchColumns::of(batch);
        out.extend((0..batch.num_rows()).filter_map(|i| columns.record_at(i)));
    }
    out
}

/// Pairs each row's full record with a score drawn from `score_column`
/// (lancedb's `_distance` for ANN search or `_score` for full-text search),
/// run through `to_score` to land on the `[0, 1]` scale.
fn parse_hits(batches: &[RecordBatch], score_column: &str, to_score: impl Fn(f32) -> f32) -> Vec<SearchHit> {
    let mut out = Vec::new();
    for batch in batches {
        let Some(scores) = as_f32(batch, score_column) else {
            continue;
        };
        let columns = BatchColumns::of(batch);
        out.extend((0..batch.num_rows()).filter_map(|i| {
            columns.record_at(i).map(|record| SearchHit {
                record,
                score: to_score(scores.value(i)),
            })
        }));
    }
    out
}

impl MemoryStore for LanceDbStore {
    fn store(&self, new: NewMemoryRecord) -> Result<MemoryRecord, MnemoError> {
        if new.text.trim().is_empty() {
            return Err(MnemoError::InvalidInput("text cannot be empty".to_string()));
        }

        let dim_hint = new.vector.len();
        let inner = self.ensure(dim_hint)?;
        if new.vector.len() != inner.dim {
            return Err(MnemoError::DimensionMismatch {
                expected: inner.dim,
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

        let batch = record_to_batch(&record, inner.dim)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema);
        self.rt
            .block_on(async { inner.table.add(reader).execute().await })
            .map_err(|e| MnemoError::EngineError(format!("lancedb add: {e}")))?;

        Ok(record)
    }

    fn import_entry(&self, record: MemoryRecord) -> Result<(), MnemoError> {
        let inner = self.ensure(record.vector.len())?;
        if let Some(existing) = self.fetch_one(&inner.table, record.id)? {
            return Err(MnemoError::Duplicate {
                existing_id: existing.id,
                similarity: 1.0,
            });
        }
        if record.vector.len() != inner.dim {
            return Err(MnemoError::DimensionMismatch {
                expected: inner.dim,
                actual: record.vector.len(),
            });
        }

        let batch = record_to_batch(&record, inner.dim)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema);
        self.rt
            .block_on(async { inner.table.add(reader).execute().await })
            .map_err(|e| MnemoError::EngineError(format!("lancedb add: {e}")))?;
        Ok(())
    }

    fn has_id(&self, id: RecordId) -> Result<bool, MnemoError> {
        let Some(inner) = self.ensure_for_read()? else {
            return Ok(false);
        };
        Ok(self.fetch_one(&inner.table, id)?.is_some())
    }

    fn vector_search(
        &self,
        vector: &[f32],
        limit: usize,
        min_score: f32,
        scope_filter: Option<&ScopeFilter>,
    ) -> Result<Vec<SearchHit>, MnemoError> {
        let Some(inner) = self.ensure_for_read()? else {
            return Ok(Vec::new());
        };
        if vector.len() != inner.dim {
            return Err(MnemoError::DimensionMismatch {
                expected: inner.dim,
                actual: vector.len(),
            });
        }

        let overfetch = (limit.saturating_mul(10)).clamp(limit.max(1), OVERFETCH_CAP);
        let predicate = combine_predicates(vec![scope_predicate(scope_filter)]);

        let batches = self.rt.block_on(async {
            let mut q = inner
                .table
                .vector_search(vector)
                .map_err(|e| MnemoError::EngineError(format!("lancedb vector_search: {e}")))?
                .limit(overfetch);
            if let Some(p) = &predicate {
                q = q.only_if(p.clone());
            }
            q.execute()
                .await
                .map_err(|e| MnemoError::EngineError(format!("lancedb execute: {e}")))?
                .try_collect::<Vec<RecordBatch>>()
                .await
                .map_err(|e| MnemoError::EngineError(format!("lancedb collect: {e}")))
        })?;

        let mut hits = parse_hits(&batches, "_distance", distance_to_similarity);
        if let Some(filter) = scope_filter {
            hits.retain(|h| filter.contains(&h.record.scope));
        }
        hits.retain(|h| h.score >= min_score);
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
        let Some(inner) = self.ensure_for_read()? else {
            return Ok(Vec::new());
        };
        if !inner.fts_ready || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let predicate = combine_predicates(vec![scope_predicate(scope_filter)]);
        let query_owned = query.to_string();
        let batches = self.rt.block_on(async {
            let mut q = inner
                .table
                .query()
                .full_text_search(lancedb::query::FullTextSearchQuery::new(query_owned))
                .limit(limit.max(1));
            if let Some(p) = &predicate {
                q = q.only_if(p.clone());
            }
            q.execute()
                .await
                .map_err(|e| MnemoError::EngineError(format!("lancedb fts execute: {e}")))?
                .try_collect::<Vec<RecordBatch>>()
                .await
                .map_err(|e| MnemoError::EngineError(format!("lancedb fts collect: {e}")))
        })?;

        let mut hits = parse_hits(&batches, "_score", |raw| normalize_bm25_raw(Some(raw)));
        hits.truncate(limit);
        Ok(hits)
    }

    fn delete(
        &self,
        id_or_prefix: &str,
        scope_filter: Option<&ScopeFilter>,
    ) -> Result<RecordId, MnemoError> {
        let Some(inner) = self.ensure_for_read()? else {
            return Err(MnemoError::NotFound(id_or_prefix.to_string()));
        };
        let id = self.resolve_id(&inner.table, id_or_prefix)?;
        let record = self
            .fetch_one(&inner.table, id)?
            .ok_or_else(|| MnemoError::NotFound(id_or_prefix.to_string()))?;
        if let Some(filter) = scope_filter {
            if !filter.contains(&record.scope) {
                return Err(MnemoError::ScopeDenied {
                    scope: record.scope,
                    agent_id: "caller".to_string(),
                });
            }
        }

        self.rt
            .block_on(async { inner.table.delete(&format!("id = '{}'", escape_sql(&id.to_string()))).await })
            .map_err(|e| MnemoError::EngineError(format!("lancedb delete: {e}")))?;
        Ok(id)
    }

    fn update(
        &self,
        id_or_prefix: &str,
        fields: UpdateFields,
        scope_filter: Option<&ScopeFilter>,
    ) -> Result<MemoryRecord, MnemoError> {
        let Some(inner) = self.ensure_for_read()? else {
            return Err(MnemoError::NotFound(id_or_prefix.to_string()));
        };
        let id = self.resolve_id(&inner.table, id_or_prefix)?;
        let old = self
            .fetch_one(&inner.table, id)?
            .ok_or_else(|| MnemoError::NotFound(id_or_prefix.to_string()))?;
        if let Some(filter) = scope_filter {
            if !filter.contains(&old.scope) {
                return Err(MnemoError::ScopeDenied {
                    scope: old.scope,
                    agent_id: "caller".to_string(),
                });
            }
        }
        if let Some(v) = &fields.vector {
            if v.len() != inner.dim {
                return Err(MnemoError::DimensionMismatch {
                    expected: inner.dim,
                    actual: v.len(),
                });
            }
        }

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

        self.rt
            .block_on(async { inner.table.delete(&format!("id = '{}'", escape_sql(&id.to_string()))).await })
            .map_err(|e| MnemoError::EngineError(format!("lancedb delete for update: {e}")))?;

        let batch = record_to_batch(&updated, inner.dim)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema);
        self.rt
            .block_on(async { inner.table.add(reader).execute().await })
            .map_err(|e| MnemoError::EngineError(format!("lancedb add for update: {e}")))?;

        Ok(updated)
    }

    fn list(
        &self,
        scope_filter: Option<&ScopeFilter>,
        category: Option<Category>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, MnemoError> {
        let Some(inner) = self.ensure_for_read()? else {
            return Ok(Vec::new());
        };

        let predicate = combine_predicates(vec![
            scope_predicate(scope_filter),
            category.map(|c| format!("category = '{c}'")),
        ]);

        let batches = self.rt.block_on(async {
            let mut q = inner
                .table
                .query()
                .select(lancedb::query::Select::columns(&[
                    "id",
                    "text",
                    "category",
                    "scope",
                    "importance",
                    "timestamp_ms",
                    "metadata",
                ]))
                .limit(offset.saturating_add(limit).max(1));
            if let Some(p) = &predicate {
                q = q.only_if(p.clone());
            }
            q.execute()
                .await
                .map_err(|e| MnemoError::EngineError(format!("lancedb list execute: {e}")))?
                .try_collect::<Vec<RecordBatch>>()
                .await
                .map_err(|e| MnemoError::EngineError(format!("lancedb list collect: {e}")))
        })?;

        let mut records = parse_records(&batches);
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    fn stats(&self, scope_filter: Option<&ScopeFilter>) -> Result<StoreStats, MnemoError> {
        let Some(inner) = self.ensure_for_read()? else {
            return Ok(StoreStats::default());
        };

        let predicate = scope_predicate(scope_filter);
        let batches = self.rt.block_on(async {
            let mut q = inner
                .table
                .query()
                .select(lancedb::query::Select::columns(&["scope", "category"]));
            if let Some(p) = &predicate {
                q = q.only_if(p.clone());
            }
            q.execute()
                .await
                .map_err(|e| MnemoError::EngineError(format!("lancedb stats execute: {e}")))?
                .try_collect::<Vec<RecordBatch>>()
                .await
                .map_err(|e| MnemoError::EngineError(format!("lancedb stats collect: {e}")))
        })?;

        let mut stats = StoreStats::default();
        for batch in &batches {
            let scopes = as_string(batch, "scope");
            let categories = as_string(batch, "category");
            for i in 0..batch.num_rows() {
                stats.total += 1;
                if let Some(s) = scopes {
                    *stats.by_scope.entry(s.value(i).to_string()).or_insert(0) += 1;
                }
                if let Some(c) = categories {
                    *stats.by_category.entry(c.value(i).to_string()).or_insert(0) += 1;
                }
            }
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
        let Some(inner) = self.ensure_for_read()? else {
            return Ok(0);
        };

        let predicate = combine_predicates(vec![
            scope_predicate(scope_filter),
            before_timestamp_ms.map(|t| format!("timestamp_ms < {t}")),
        ]);
        let Some(predicate) = predicate else {
            return Ok(0);
        };

        let before = self
            .rt
            .block_on(async { inner.table.count_rows(Some(predicate.clone())).await })
            .map_err(|e| MnemoError::EngineError(format!("lancedb count: {e}")))?;
        self.rt
            .block_on(async { inner.table.delete(&predicate).await })
            .map_err(|e| MnemoError::EngineError(format!("lancedb bulk delete: {e}")))?;
        Ok(before)
    }

    fn has_fts_support(&self) -> bool {
        self.current().map(|i| i.fts_ready).unwrap_or(false)
    }

    fn vector_dim(&self) -> usize {
        self.current().map_or(0, |i| i.dim)
    }
}

impl std::fmt::Debug for LanceDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceDbStore").field("uri", &self.uri).finish()
    }
}
