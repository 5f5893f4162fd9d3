use thiserror::Error;

use crate::record::RecordId;

/// The error taxonomy shared by the store, retriever, and tool surface.
///
/// Each variant carries the context a caller needs to decide what to do
/// next; none of them are meant to unwind a panic.
#[derive(Debug, Error)]
pub enum MnemoError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("scope '{scope}' is not accessible to agent '{agent_id}'")]
    ScopeDenied { scope: String, agent_id: String },

    #[error("id prefix '{prefix}' matches {matches} records, need a longer prefix")]
    AmbiguousPrefix { prefix: String, matches: usize },

    #[error("no record found for '{0}'")]
    NotFound(String),

    #[error("duplicate of existing record {existing_id} (similarity {similarity:.3})")]
    Duplicate {
        existing_id: RecordId,
        similarity: f32,
    },

    #[error("text rejected by noise filter")]
    Noise,

    #[error("remote service error: {detail}")]
    RemoteService {
        status: Option<u16>,
        detail: String,
    },

    #[error("engine error: {0}")]
    EngineError(String),
}

impl MnemoError {
    /// A short machine-readable code, used as the JSON-RPC error code's
    /// human label and in structured logging.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::ScopeDenied { .. } => "scope_denied",
            Self::AmbiguousPrefix { .. } => "ambiguous_prefix",
            Self::NotFound(_) => "not_found",
            Self::Duplicate { .. } => "duplicate",
            Self::Noise => "noise",
            Self::RemoteService { .. } => "remote_service",
            Self::EngineError(_) => "engine_error",
        }
    }
}
