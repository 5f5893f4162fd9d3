use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{EmbeddingRequest, EmbeddingResponse};

/// A single remote embedding service. This is the low-level, per-provider
/// contract; `EmbeddingClient` wraps an `Arc<dyn EmbeddingProvider>` with
/// caching, batching, and the dimension/role contract the retrieval core
/// relies on.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn model(&self) -> &str;

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError>;
}
