use std::sync::Arc;

use crate::config::EmbeddingProviderConfig;
use crate::error::ProviderError;
use crate::providers::{JinaEmbeddingProvider, OpenAiEmbeddingProvider, VoyageEmbeddingProvider};
use crate::traits::EmbeddingProvider;

pub fn build_embedding_provider(
    cfg: EmbeddingProviderConfig,
) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
    match cfg {
        EmbeddingProviderConfig::Voyage(c) => Ok(Arc::new(VoyageEmbeddingProvider::new(c)?)),
        EmbeddingProviderConfig::OpenAi(c) => Ok(Arc::new(OpenAiEmbeddingProvider::new(c)?)),
        EmbeddingProviderConfig::Jina(c) => Ok(Arc::new(JinaEmbeddingProvider::new(c)?)),
    }
}
