pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod factory;
pub mod providers;
pub mod traits;
pub mod types;

pub use cache::CacheStats;
pub use client::EmbeddingClient;
pub use config::*;
pub use error::ProviderError;
pub use factory::build_embedding_provider;
pub use traits::EmbeddingProvider;
pub use types::*;
