use std::time::Duration;

/// The reranker wall-clock timeout (spec §4.3 step 6, §5).
pub const RERANK_TIMEOUT: Duration = Duration::from_secs(5);

/// The reranker base URL is hard-coded to Voyage regardless of which
/// embedding provider supplied the query/passage vectors — an explicit
/// open question in the spec, resolved here in favor of the documented
/// contract rather than a pluggable base URL (see DESIGN.md).
#[derive(Debug, Clone)]
pub struct VoyageRerankConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl VoyageRerankConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.voyageai.com".to_string(),
            model: model.into(),
            timeout: RERANK_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub enum RerankProviderConfig {
    Voyage(VoyageRerankConfig),
}
