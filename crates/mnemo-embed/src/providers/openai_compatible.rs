//! Shared request/response plumbing for the `{model, input, [task],
//! [dimensions]} -> {data: [{index, embedding}]}` shape that OpenAI and
//! Jina both speak. The OpenAI and Jina provider structs are thin wrappers
//! around this with different base URLs and task-parameter policies.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::traits::EmbeddingProvider;
use crate::types::{EmbeddingRequest, EmbeddingResponse, Role};

pub(crate) struct OpenAiCompatibleParams {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub task_query: Option<String>,
    pub task_passage: Option<String>,
}

pub(crate) struct OpenAiCompatibleEmbeddingProvider {
    params: OpenAiCompatibleParams,
    client: Client,
    provider_name: &'static str,
}

impl OpenAiCompatibleEmbeddingProvider {
    pub(crate) fn new(
        params: OpenAiCompatibleParams,
        provider_name: &'static str,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(params.timeout).build()?;
        Ok(Self {
            params,
            client,
            provider_name,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/embeddings", self.params.base_url.trim_end_matches('/'))
    }

    fn task_name(&self, role: Role) -> Option<&str> {
        match role {
            Role::Query => self.params.task_query.as_deref(),
            Role::Passage => self.params.task_passage.as_deref(),
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiCompatibleEmbeddingProvider {
    fn name(&self) -> &'static str {
        self.provider_name
    }

    fn model(&self) -> &str {
        &self.params.model
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        if request.inputs.is_empty() {
            return Err(ProviderError::EmptyInput);
        }

        let mut payload = Map::new();
        payload.insert("model".to_string(), Value::String(self.params.model.clone()));
        payload.insert(
            "input".to_string(),
            Value::Array(request.inputs.iter().cloned().map(Value::String).collect()),
        );
        if let Some(dim) = request.dimensions {
            payload.insert("dimensions".to_string(), Value::Number(dim.into()));
        }
        if let Some(task) = self.task_name(request.role) {
            payload.insert("task".to_string(), Value::String(task.to_string()));
        }

        let res = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.params.api_key)
            .json(&payload)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        let parsed: OpenAiCompatibleResponse = res.json().await?;
        if parsed.data.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "no embeddings in response".to_string(),
            ));
        }

        let mut data = parsed.data;
        data.sort_by_key(|item| item.index);
        let vectors = data.into_iter().map(|item| item.embedding).collect();

        Ok(EmbeddingResponse {
            provider: self.provider_name.to_string(),
            model: parsed.model.unwrap_or_else(|| self.params.model.clone()),
            vectors,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiCompatibleResponse {
    model: Option<String>,
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}
