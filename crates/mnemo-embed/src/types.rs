/// Whether a text is being embedded as a search query or as a stored
/// passage. Providers that distinguish the two (Voyage's `input_type`,
/// Jina's `task`) receive this; providers that don't (OpenAI) ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Query,
    Passage,
}

#[derive(Debug, Clone)]
pub struct EmbeddingRequest {
    pub inputs: Vec<String>,
    pub role: Role,
    /// OpenAI's `text-embedding-3-*` truncation parameter; ignored by
    /// providers that don't support it.
    pub dimensions: Option<usize>,
}

impl EmbeddingRequest {
    #[must_use]
    pub fn single(input: impl Into<String>, role: Role, dimensions: Option<usize>) -> Self {
        Self {
            inputs: vec![input.into()],
            role,
            dimensions,
        }
    }

    #[must_use]
    pub fn batch(inputs: Vec<String>, role: Role, dimensions: Option<usize>) -> Self {
        Self {
            inputs,
            role,
            dimensions,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingResponse {
    pub provider: String,
    pub model: String,
    pub vectors: Vec<Vec<f32>>,
}
