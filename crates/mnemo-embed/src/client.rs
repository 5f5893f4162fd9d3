use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::cache::{CacheStats, EmbeddingCache};
use crate::config::{CacheConfig, DEFAULT_TIMEOUT, MAX_BATCH_SIZE};
use crate::error::ProviderError;
use crate::traits::EmbeddingProvider;
use crate::types::{EmbeddingRequest, Role};

/// The Embedding Client component (spec §4.1): wraps a low-level
/// `EmbeddingProvider` with the cache, batching, and dimension contract
/// the rest of the retrieval core relies on.
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
    dimensions: usize,
    timeout: Duration,
}

impl EmbeddingClient {
    #[must_use]
    pub fn new(provider: Arc<dyn EmbeddingProvider>, dimensions: usize) -> Self {
        Self::with_config(provider, dimensions, &CacheConfig::default(), DEFAULT_TIMEOUT)
    }

    #[must_use]
    pub fn with_config(
        provider: Arc<dyn EmbeddingProvider>,
        dimensions: usize,
        cache_config: &CacheConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            cache: EmbeddingCache::new(cache_config),
            dimensions,
            timeout,
        }
    }

    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_one(text, Role::Query).await
    }

    pub async fn embed_passage(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_one(text, Role::Passage).await
    }

    pub async fn embed_batch_query(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.embed_batch(texts, Role::Query).await
    }

    pub async fn embed_batch_passage(
        &self,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.embed_batch(texts, Role::Passage).await
    }

    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[must_use]
    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// A lightweight connectivity check: embed a short probe string.
    pub async fn test(&self) -> Result<(), ProviderError> {
        self.embed_query("connectivity probe").await.map(|_| ())
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn embed_one(&self, text: &str, role: Role) -> Result<Vec<f32>, ProviderError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ProviderError::EmptyInput);
        }
        if let Some(cached) = self.cache.get(role, trimmed) {
            return Ok(cached);
        }

        let request = EmbeddingRequest::single(trimmed, role, Some(self.dimensions));
        let response = tokio::time::timeout(self.timeout, self.provider.embed(request))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;

        let vector = response
            .vectors
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("provider returned no vectors".to_string()))?;

        if vector.len() != self.dimensions {
            return Err(ProviderError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }

        self.cache.put(role, trimmed, vector.clone());
        Ok(vector)
    }

    /// Batch variant preserving positional alignment: empty/whitespace
    /// entries become an empty placeholder vector at the same index (spec
    /// §4.1). Valid entries are packed into provider requests of at most
    /// `MAX_BATCH_SIZE`.
    async fn embed_batch(&self, texts: &[String], role: Role) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut results: Vec<Vec<f32>> = vec![Vec::new(); texts.len()];
        let mut pending_idx: Vec<usize> = Vec::new();
        let mut pending_text: Vec<String> = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(cached) = self.cache.get(role, trimmed) {
                if let Some(slot) = results.get_mut(i) {
                    *slot = cached;
                }
            } else {
                pending_idx.push(i);
                pending_text.push(trimmed.to_string());
            }
        }

        for (idx_chunk, text_chunk) in pending_idx
            .chunks(MAX_BATCH_SIZE)
            .zip(pending_text.chunks(MAX_BATCH_SIZE))
        {
            let request = EmbeddingRequest::batch(text_chunk.to_vec(), role, Some(self.dimensions));
            let response = tokio::time::timeout(self.timeout, self.provider.embed(request))
                .await
                .map_err(|_| ProviderError::Timeout(self.timeout))??;

            if response.vectors.len() != idx_chunk.len() {
                warn!(
                    expected = idx_chunk.len(),
                    actual = response.vectors.len(),
                    "embedding provider returned a mismatched batch size"
                );
                return Err(ProviderError::InvalidResponse(
                    "batch response length did not match request".to_string(),
                ));
            }

            for (&i, (vector, text)) in idx_chunk.iter().zip(response.vectors.into_iter().zip(text_chunk)) {
                if vector.len() != self.dimensions {
                    return Err(ProviderError::DimensionMismatch {
                        expected: self.dimensions,
                        actual: vector.len(),
                    });
                }
                self.cache.put(role, text, vector.clone());
                if let Some(slot) = results.get_mut(i) {
                    *slot = vector;
                }
            }
        }

        Ok(results)
    }
}
