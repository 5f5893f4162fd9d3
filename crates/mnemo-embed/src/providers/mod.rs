mod openai_compatible;

pub mod jina;
pub mod openai;
pub mod voyage;

pub use jina::JinaEmbeddingProvider;
pub use openai::OpenAiEmbeddingProvider;
pub use voyage::VoyageEmbeddingProvider;
