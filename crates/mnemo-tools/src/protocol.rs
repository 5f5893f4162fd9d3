use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcResponse {
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Maps an internal error to a JSON-RPC error code, using
/// `MnemoError::code()` as the message label (spec §7 "Propagation").
#[must_use]
pub fn error_code_for(err: &mnemo_core::error::MnemoError) -> i64 {
    use mnemo_core::error::MnemoError;
    match err {
        MnemoError::InvalidInput(_) | MnemoError::AmbiguousPrefix { .. } => -32602,
        MnemoError::ScopeDenied { .. } => -32001,
        MnemoError::NotFound(_) => -32002,
        MnemoError::Duplicate { .. } => -32003,
        MnemoError::Noise => -32004,
        MnemoError::DimensionMismatch { .. } => -32005,
        MnemoError::RemoteService { .. } => -32006,
        MnemoError::EngineError(_) => -32000,
    }
}
