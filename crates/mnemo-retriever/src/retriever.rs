//! The hot path: `Retriever::retrieve` turns a query into a ranked list of
//! memory records by running the fusion → rerank → post-processing → MMR
//! pipeline described in the component design. Every stage is a thin
//! wrapper around a pure function in `mnemo_core::score`; this module's
//! job is orchestration (store/embedder/reranker I/O) and bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use tracing::warn;

use mnemo_core::error::MnemoError;
use mnemo_core::gate::is_noise;
use mnemo_core::record::RecordId;
use mnemo_core::score::{
    age_days, blend_lightweight, blend_reranked, cosine_similarity, fuse_bm25_only, fuse_both,
    fuse_vector_only, importance_weight, length_norm, mmr_order, recency_boost, time_decay, unranked_penalty,
};
use mnemo_embed::client::EmbeddingClient;
use mnemo_embed::error::ProviderError as EmbedError;
use mnemo_rerank::traits::RerankProvider;
use mnemo_rerank::types::{RerankRequest, RerankResponse};
use mnemo_storage::{MemoryStore, ScopeFilter, SearchHit};

use crate::config::{RetrievalConfig, RetrievalMode};
use crate::types::{category_matches, Candidate, RankedResult, RetrievalContext};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn embed_err(e: EmbedError) -> MnemoError {
    match e {
        EmbedError::DimensionMismatch { expected, actual } => {
            MnemoError::DimensionMismatch { expected, actual }
        }
        other => MnemoError::RemoteService {
            status: None,
            detail: other.to_string(),
        },
    }
}

pub struct Retriever {
    store: Arc<dyn MemoryStore>,
    embedder: Arc<EmbeddingClient>,
    reranker: Option<Arc<dyn RerankProvider>>,
    config: RwLock<RetrievalConfig>,
}

impl Retriever {
    #[must_use]
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Arc<EmbeddingClient>,
        reranker: Option<Arc<dyn RerankProvider>>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            reranker,
            config: RwLock::new(config),
        }
    }

    #[must_use]
    pub fn get_config(&self) -> RetrievalConfig {
        self.config.read().clone()
    }

    pub fn update_config(&self, config: RetrievalConfig) {
        *self.config.write() = config;
    }

    /// A lightweight connectivity check for the components this retriever
    /// depends on: the embedder (and, if configured, the reranker).
    pub async fn test(&self) -> Result<(), MnemoError> {
        self.embedder.test().await.map_err(embed_err)?;
        Ok(())
    }

    pub async fn retrieve(&self, context: RetrievalContext) -> Result<Vec<RankedResult>, MnemoError> {
        let config = self.get_config();
        let limit = context.clamped_limit();

        let query_vector = self.embedder.embed_query(&context.query).await.map_err(embed_err)?;

        let hybrid = config.mode == RetrievalMode::Hybrid && self.store.has_fts_support();
        let pool_size = config.pool_size.max(2 * limit);

        let mut candidates = if hybrid {
            self.dual_search(
                &context.query,
                query_vector.clone(),
                pool_size,
                context.scope_filter.clone(),
            )
            .await?
        } else {
            let vector_hits = self
                .store
                .vector_search(&query_vector, pool_size, 0.0, context.scope_filter.as_ref())?;
            fuse_vector_only_candidates(vector_hits)
        };

        candidates.retain(|c| category_matches(&c.record, context.category));
        candidates.retain(|c| c.fused >= config.min_score);
        candidates.sort_by(|a, b| b.fused.total_cmp(&a.fused));

        if config.rerank_enabled {
            self.rerank(&context.query, &query_vector, &mut candidates, limit).await;
        }

        self.post_process(&mut candidates, &config);

        candidates.retain(|c| c.fused >= config.hard_min_score);

        if config.noise_filter_enabled {
            candidates.retain(|c| !is_noise(&c.record.text, &config.noise_filter));
        }

        let diversified = diversify(candidates, config.mmr_threshold, limit);
        Ok(diversified.into_iter().map(Candidate::into_ranked).collect())
    }

    /// Runs the vector and BM25 searches on the blocking thread pool so the
    /// two round-trips genuinely overlap (spec §4.3 step 4, §5 "dual search
    /// step launches vector and BM25 in parallel"); `MemoryStore` itself is
    /// a synchronous trait (see its module docs).
    async fn dual_search(
        &self,
        query: &str,
        query_vector: Vec<f32>,
        pool_size: usize,
        scope_filter: Option<ScopeFilter>,
    ) -> Result<Vec<Candidate>, MnemoError> {
        let vector_store = self.store.clone();
        let vector_filter = scope_filter.clone();
        let vector_task = tokio::task::spawn_blocking(move || {
            vector_store.vector_search(&query_vector, pool_size, 0.0, vector_filter.as_ref())
        });

        let bm25_store = self.store.clone();
        let query_owned = query.to_string();
        let bm25_task =
            tokio::task::spawn_blocking(move || bm25_store.bm25_search(&query_owned, pool_size, scope_filter.as_ref()));

        let (vector_result, bm25_result) = tokio::join!(vector_task, bm25_task);

        let vector_hits = vector_result
            .map_err(|e| MnemoError::EngineError(format!("vector search task panicked: {e}")))??;

        // BM25 failure (or its task panicking) degrades to vector-only
        // rather than failing the whole query (spec §4.3 error policy).
        let bm25_hits = match bm25_result {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                warn!(error = %e, "bm25 search failed, degrading to vector-only for this query");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "bm25 search task panicked, degrading to vector-only for this query");
                Vec::new()
            }
        };

        Ok(fuse_hybrid_candidates(vector_hits, bm25_hits))
    }

    async fn rerank(&self, query: &str, query_vector: &[f32], candidates: &mut Vec<Candidate>, limit: usize) {
        let Some(reranker) = &self.reranker else {
            return;
        };
        if candidates.is_empty() {
            return;
        }

        let top_n = (2 * limit).min(candidates.len());
        let documents: Vec<String> = candidates.iter().take(top_n).map(|c| c.record.text.clone()).collect();

        let request = RerankRequest {
            query: query.to_string(),
            documents,
            top_k: Some(top_n),
        };

        match tokio::time::timeout(mnemo_rerank::config::RERANK_TIMEOUT, reranker.rerank(request)).await {
            Ok(Ok(response)) => apply_cross_encoder(candidates, top_n, &response),
            Ok(Err(e)) => {
                warn!(error = %e, "cross-encoder rerank failed, falling back to lightweight cosine blend");
                apply_lightweight(candidates, query_vector);
            }
            Err(_) => {
                warn!("cross-encoder rerank timed out, falling back to lightweight cosine blend");
                apply_lightweight(candidates, query_vector);
            }
        }

        candidates.sort_by(|a, b| b.fused.total_cmp(&a.fused));
    }

    fn post_process(&self, candidates: &mut [Candidate], config: &RetrievalConfig) {
        let now = now_ms();
        resort_stage(candidates, |c| {
            let age = age_days(now, c.record.timestamp);
            c.fused = recency_boost(c.fused, age, config.recency_half_life_days, config.recency_weight);
        });
        resort_stage(candidates, |c| {
            c.fused = importance_weight(c.fused, c.record.importance);
        });
        resort_stage(candidates, |c| {
            let char_len = c.record.text.chars().count();
            c.fused = length_norm(c.fused, char_len, config.length_anchor_chars);
        });
        resort_stage(candidates, |c| {
            let age = age_days(now, c.record.timestamp);
            c.fused = time_decay(c.fused, age, config.time_decay_half_life_days);
        });
    }
}

fn resort_stage(candidates: &mut [Candidate], mut apply: impl FnMut(&mut Candidate)) {
    for c in candidates.iter_mut() {
        apply(c);
    }
    candidates.sort_by(|a, b| b.fused.total_cmp(&a.fused));
}

fn apply_cross_encoder(candidates: &mut [Candidate], top_n: usize, response: &RerankResponse) {
    let mut scores: HashMap<usize, f32> = HashMap::new();
    for item in &response.items {
        scores.insert(item.index, item.relevance_score);
    }
    for (i, candidate) in candidates.iter_mut().enumerate() {
        if i >= top_n {
            break;
        }
        if let Some(&raw) = scores.get(&i) {
            candidate.reranker_score = Some(raw);
            candidate.fused = blend_reranked(raw, candidate.fused);
        } else {
            candidate.fused = unranked_penalty(candidate.fused);
        }
    }
}

fn apply_lightweight(candidates: &mut [Candidate], query_vector: &[f32]) {
    for candidate in candidates.iter_mut() {
        let cosine = cosine_similarity(query_vector, &candidate.record.vector).unwrap_or(0.0);
        candidate.fused = blend_lightweight(candidate.fused, cosine);
    }
}

fn diversify(candidates: Vec<Candidate>, threshold: f32, limit: usize) -> Vec<Candidate> {
    let vectors: Vec<Vec<f32>> = candidates.iter().map(|c| c.record.vector.clone()).collect();
    let order = mmr_order(&vectors, threshold);
    let mut pool: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(limit.min(order.len()));
    for idx in order {
        if out.len() >= limit {
            break;
        }
        if let Some(slot) = pool.get_mut(idx) {
            if let Some(candidate) = slot.take() {
                out.push(candidate);
            }
        }
    }
    out
}

fn fuse_vector_only_candidates(hits: Vec<SearchHit>) -> Vec<Candidate> {
    hits.into_iter()
        .map(|hit| Candidate {
            record: hit.record,
            fused: fuse_vector_only(hit.score),
            vector_score: Some(hit.score),
            bm25_score: None,
            reranker_score: None,
        })
        .collect()
}

fn fuse_hybrid_candidates(vector_hits: Vec<SearchHit>, bm25_hits: Vec<SearchHit>) -> Vec<Candidate> {
    let mut bm25_by_id: HashMap<RecordId, SearchHit> =
        bm25_hits.into_iter().map(|h| (h.record.id, h)).collect();

    let mut out = Vec::new();
    for vector_hit in vector_hits {
        let id = vector_hit.record.id;
        if let Some(bm25_hit) = bm25_by_id.remove(&id) {
            out.push(Candidate {
                fused: fuse_both(vector_hit.score, bm25_hit.score),
                vector_score: Some(vector_hit.score),
                bm25_score: Some(bm25_hit.score),
                reranker_score: None,
                record: vector_hit.record,
            });
        } else {
            out.push(Candidate {
                fused: fuse_vector_only(vector_hit.score),
                vector_score: Some(vector_hit.score),
                bm25_score: None,
                reranker_score: None,
                record: vector_hit.record,
            });
        }
    }

    for (_, bm25_hit) in bm25_by_id {
        out.push(Candidate {
            fused: fuse_bm25_only(bm25_hit.score),
            vector_score: None,
            bm25_score: Some(bm25_hit.score),
            reranker_score: None,
            record: bm25_hit.record,
        });
    }

    out
}
