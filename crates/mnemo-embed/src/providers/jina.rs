use crate::config::JinaConfig;
use crate::error::ProviderError;
use crate::providers::openai_compatible::{OpenAiCompatibleEmbeddingProvider, OpenAiCompatibleParams};
use crate::traits::EmbeddingProvider;
use crate::types::{EmbeddingRequest, EmbeddingResponse};

/// Jina carries role via `task: retrieval.query|retrieval.passage`,
/// honored only for the v3 model family (spec §4.1, §6).
pub struct JinaEmbeddingProvider {
    inner: OpenAiCompatibleEmbeddingProvider,
}

impl JinaEmbeddingProvider {
    pub fn new(config: JinaConfig) -> Result<Self, ProviderError> {
        let (task_query, task_passage) = if config.supports_task_param() {
            (
                Some("retrieval.query".to_string()),
                Some("retrieval.passage".to_string()),
            )
        } else {
            (None, None)
        };
        let params = OpenAiCompatibleParams {
            api_key: config.api_key,
            base_url: config.base_url,
            model: config.model,
            timeout: config.timeout,
            task_query,
            task_passage,
        };
        Ok(Self {
            inner: OpenAiCompatibleEmbeddingProvider::new(params, "jina")?,
        })
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for JinaEmbeddingProvider {
    fn name(&self) -> &'static str {
        "jina"
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        self.inner.embed(request).await
    }
}
