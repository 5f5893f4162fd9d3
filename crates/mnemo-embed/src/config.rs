use std::time::Duration;

/// Default wall-clock timeout for an embedding HTTP call (spec §4.1).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default LRU cache capacity (spec §4.1, §9).
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Default LRU cache TTL (spec §4.1, §9).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Maximum entries packed into a single provider batch request (spec §4.1).
pub const MAX_BATCH_SIZE: usize = 128;

#[derive(Debug, Clone)]
pub struct VoyageConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl VoyageConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.voyageai.com".to_string(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com".to_string(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JinaConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl JinaConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.jina.ai".to_string(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// True for the v3 model family, the only one for which the `task`
    /// parameter is honored (spec §4.1).
    #[must_use]
    pub fn supports_task_param(&self) -> bool {
        self.model.contains("-v3")
    }
}

#[derive(Debug, Clone)]
pub enum EmbeddingProviderConfig {
    Voyage(VoyageConfig),
    OpenAi(OpenAiConfig),
    Jina(JinaConfig),
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            ttl: DEFAULT_CACHE_TTL,
        }
    }
}
