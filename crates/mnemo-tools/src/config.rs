//! Environment-variable-driven construction of a `McpServer`'s components,
//! following the `MNEMO_*`-prefixed convention (renamed from the teacher's
//! `PRX_MEMORY_*` prefix; see spec §7 "Ambient addition — configuration").

use std::collections::HashMap;
use std::sync::Arc;

use mnemo_core::error::MnemoError;
use mnemo_core::scope::{ScopeConfig, ScopeManager};
use mnemo_embed::client::EmbeddingClient;
use mnemo_embed::config::{EmbeddingProviderConfig, JinaConfig, OpenAiConfig, VoyageConfig};
use mnemo_embed::factory::build_embedding_provider;
use mnemo_rerank::config::{RerankProviderConfig, VoyageRerankConfig};
use mnemo_rerank::factory::build_rerank_provider;
use mnemo_rerank::traits::RerankProvider;
use mnemo_retriever::RetrievalConfig;
use mnemo_storage::{build_store, MemoryStore, StoreConfig};

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses `MNEMO_AGENT_ACCESS` as `agent=scope1|scope2;agent2=scope3`.
fn parse_agent_access(raw: &str) -> HashMap<String, Vec<String>> {
    let mut out = HashMap::new();
    for entry in raw.split(';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let Some((agent, scopes)) = entry.split_once('=') else {
            continue;
        };
        let scopes: Vec<String> = scopes
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if !scopes.is_empty() {
            out.insert(agent.trim().to_string(), scopes);
        }
    }
    out
}

fn scope_manager_from_env() -> ScopeManager {
    let default_scope = env_string("MNEMO_DEFAULT_SCOPE", mnemo_core::record::DEFAULT_SCOPE);
    let mut config = ScopeConfig::new(default_scope);
    if let Ok(raw) = std::env::var("MNEMO_ALLOWED_SCOPES") {
        for scope in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            config = config.with_scope(scope.to_string());
        }
    }
    if let Ok(raw) = std::env::var("MNEMO_AGENT_ACCESS") {
        for (agent, scopes) in parse_agent_access(&raw) {
            config = config.with_agent_access(agent, scopes);
        }
    }
    ScopeManager::new(config)
}

fn embedding_provider_config_from_env() -> Result<EmbeddingProviderConfig, MnemoError> {
    let provider = env_string("MNEMO_EMBED_PROVIDER", "voyage");
    match provider.as_str() {
        "openai" => {
            let api_key = std::env::var("MNEMO_OPENAI_API_KEY")
                .map_err(|_| MnemoError::InvalidInput("MNEMO_OPENAI_API_KEY is required".to_string()))?;
            let model = env_string("MNEMO_EMBED_MODEL", "text-embedding-3-small");
            Ok(EmbeddingProviderConfig::OpenAi(OpenAiConfig::new(api_key, model)))
        }
        "jina" => {
            let api_key = std::env::var("MNEMO_JINA_API_KEY")
                .map_err(|_| MnemoError::InvalidInput("MNEMO_JINA_API_KEY is required".to_string()))?;
            let model = env_string("MNEMO_EMBED_MODEL", "jina-embeddings-v3");
            Ok(EmbeddingProviderConfig::Jina(JinaConfig::new(api_key, model)))
        }
        _ => {
            let api_key = std::env::var("MNEMO_VOYAGE_API_KEY")
                .map_err(|_| MnemoError::InvalidInput("MNEMO_VOYAGE_API_KEY is required".to_string()))?;
            let model = env_string("MNEMO_EMBED_MODEL", "voyage-3");
            Ok(EmbeddingProviderConfig::Voyage(VoyageConfig::new(api_key, model)))
        }
    }
}

fn rerank_provider_from_env() -> Option<Arc<dyn RerankProvider>> {
    if env_string("MNEMO_RERANK_ENABLED", "true") == "false" {
        return None;
    }
    let api_key = std::env::var("MNEMO_VOYAGE_API_KEY").ok()?;
    let model = env_string("MNEMO_RERANK_MODEL", "rerank-2");
    let cfg = RerankProviderConfig::Voyage(VoyageRerankConfig::new(api_key, model));
    build_rerank_provider(cfg).ok()
}

fn store_config_from_env(vector_dim: usize) -> StoreConfig {
    let backend = env_string("MNEMO_STORE_BACKEND", "json");
    match backend.as_str() {
        "lancedb" => StoreConfig::LanceDb {
            uri: env_string("MNEMO_STORE_PATH", "./data/mnemo-db"),
        },
        _ => StoreConfig::Json {
            path: env_string("MNEMO_STORE_PATH", "./data/mnemo-db.json"),
            vector_dim,
        },
    }
}

/// Everything needed to construct a `McpServer`, assembled from the
/// process environment at the edge (spec §7 "Ambient addition —
/// configuration").
pub struct ServerComponents {
    pub agent_id: String,
    pub scopes: ScopeManager,
    pub store: Arc<dyn MemoryStore>,
    pub embedder: Arc<EmbeddingClient>,
    pub reranker: Option<Arc<dyn RerankProvider>>,
    pub retrieval_config: RetrievalConfig,
}

impl ServerComponents {
    pub fn from_env() -> Result<Self, MnemoError> {
        let agent_id = env_string("MNEMO_AGENT_ID", "default");
        let vector_dim = env_usize("MNEMO_EMBED_DIM", 1024);

        let embed_cfg = embedding_provider_config_from_env()?;
        let provider = build_embedding_provider(embed_cfg)
            .map_err(|e| MnemoError::RemoteService { status: None, detail: e.to_string() })?;
        let embedder = Arc::new(EmbeddingClient::new(provider, vector_dim));

        let store = build_store(store_config_from_env(vector_dim))?;
        let reranker = rerank_provider_from_env();
        let scopes = scope_manager_from_env();

        Ok(Self {
            agent_id,
            scopes,
            store,
            embedder,
            reranker,
            retrieval_config: RetrievalConfig::default(),
        })
    }
}
