use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::VoyageRerankConfig;
use crate::error::ProviderError;
use crate::traits::RerankProvider;
use crate::types::{RerankItem, RerankRequest, RerankResponse};

pub struct VoyageRerankProvider {
    config: VoyageRerankConfig,
    client: Client,
}

impl VoyageRerankProvider {
    pub fn new(config: VoyageRerankConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/rerank", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl RerankProvider for VoyageRerankProvider {
    fn name(&self) -> &'static str {
        "voyage"
    }

    async fn rerank(&self, request: RerankRequest) -> Result<RerankResponse, ProviderError> {
        if request.documents.is_empty() {
            return Err(ProviderError::Config(
                "rerank documents is empty".to_string(),
            ));
        }

        let document_count = request.documents.len();
        let payload = VoyageRerankRequestBody {
            model: &self.config.model,
            query: &request.query,
            documents: &request.documents,
            top_k: request.top_k.unwrap_or(document_count),
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

        let parsed: VoyageRerankResponseBody = res.json().await?;
        let items = parsed
            .data
            .into_iter()
            // indices beyond the sent document count are discarded (spec §6)
            .filter(|item| item.index < document_count)
            .map(|item| RerankItem {
                index: item.index,
                relevance_score: item.relevance_score,
            })
            .collect();

        Ok(RerankResponse {
            provider: self.name().to_string(),
            model: self.config.model.clone(),
            items,
        })
    }
}

#[derive(Debug, Serialize)]
struct VoyageRerankRequestBody<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct VoyageRerankResponseBody {
    data: Vec<VoyageRerankItem>,
}

#[derive(Debug, Deserialize)]
struct VoyageRerankItem {
    index: usize,
    relevance_score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_url_and_path() {
        let config = VoyageRerankConfig::new("key", "rerank-2");
        let provider = VoyageRerankProvider::new(config).unwrap();
        assert_eq!(provider.endpoint(), "https://api.voyageai.com/v1/rerank");
    }
}
