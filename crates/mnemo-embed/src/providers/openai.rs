use crate::config::OpenAiConfig;
use crate::error::ProviderError;
use crate::providers::openai_compatible::{OpenAiCompatibleEmbeddingProvider, OpenAiCompatibleParams};
use crate::traits::EmbeddingProvider;
use crate::types::{EmbeddingRequest, EmbeddingResponse};

/// OpenAI has no query/passage role distinction; `text-embedding-3-*`
/// models accept the `dimensions` truncation parameter carried on the
/// request (spec §4.1, §6).
pub struct OpenAiEmbeddingProvider {
    inner: OpenAiCompatibleEmbeddingProvider,
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self, ProviderError> {
        let params = OpenAiCompatibleParams {
            api_key: config.api_key,
            base_url: config.base_url,
            model: config.model,
            timeout: config.timeout,
            task_query: None,
            task_passage: None,
        };
        Ok(Self {
            inner: OpenAiCompatibleEmbeddingProvider::new(params, "openai")?,
        })
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        self.inner.embed(request).await
    }
}
