use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::VoyageConfig;
use crate::error::ProviderError;
use crate::traits::EmbeddingProvider;
use crate::types::{EmbeddingRequest, EmbeddingResponse, Role};

/// Voyage distinguishes `input_type: query|document` but offers no
/// dimension override (spec §4.1, §6).
pub struct VoyageEmbeddingProvider {
    config: VoyageConfig,
    client: Client,
}

impl VoyageEmbeddingProvider {
    pub fn new(config: VoyageConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/embeddings", self.config.base_url.trim_end_matches('/'))
    }

    const fn input_type(role: Role) -> &'static str {
        match role {
            Role::Query => "query",
            Role::Passage => "document",
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for VoyageEmbeddingProvider {
    fn name(&self) -> &'static str {
        "voyage"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        if request.inputs.is_empty() {
            return Err(ProviderError::EmptyInput);
        }

        let payload = VoyageEmbedRequest {
            model: &self.config.model,
            input: &request.inputs,
            input_type: Self::input_type(request.role),
        };

        let res = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        let parsed: VoyageEmbedResponse = res.json().await?;
        if parsed.data.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "no embeddings in response".to_string(),
            ));
        }

        Ok(EmbeddingResponse {
            provider: self.name().to_string(),
            model: self.config.model.clone(),
            vectors: parsed.data.into_iter().map(|item| item.embedding).collect(),
        })
    }
}

#[derive(Debug, Serialize)]
struct VoyageEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    input_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct VoyageEmbedResponse {
    data: Vec<VoyageEmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct VoyageEmbeddingItem {
    embedding: Vec<f32>,
}
