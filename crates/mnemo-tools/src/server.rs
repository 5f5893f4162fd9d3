//! The `McpServer`: a JSON-RPC 2.0 dispatch surface over six operations
//! (recall/store/forget/update/stats/list), each consulting the scope
//! manager before it reaches the store (spec §4.5, §4.6). Modeled on the
//! teacher's `McpServer` dispatch shape, generalized to an async pipeline
//! since this crate's embedder/retriever are `async fn` throughout.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use mnemo_core::error::MnemoError;
use mnemo_core::gate::{is_noise, NoiseFilterConfig};
use mnemo_core::record::{looks_like_identifier, Category, MemoryRecord, NewMemoryRecord, DEFAULT_IMPORTANCE};
use mnemo_core::scope::ScopeManager;
use mnemo_embed::client::EmbeddingClient;
use mnemo_retriever::{RankedResult, RetrievalContext, Retriever};
use mnemo_storage::{MemoryStore, ScopeFilter, UpdateFields};

use crate::config::ServerComponents;
use crate::protocol::{error_code_for, JsonRpcRequest, JsonRpcResponse};

/// Near-duplicate rejection threshold for `store` (spec §4.6).
const DUPLICATE_THRESHOLD: f32 = 0.98;
/// `forget` by query only deletes on a single, high-confidence match.
const FORGET_CONFIDENCE: f32 = 0.9;
/// `update` resolves a free-text identifier only on a high-confidence match.
const UPDATE_CONFIDENCE: f32 = 0.85;

pub struct McpServer {
    agent_id: String,
    scopes: ScopeManager,
    store: Arc<dyn MemoryStore>,
    embedder: Arc<EmbeddingClient>,
    retriever: Retriever,
    noise_filter: NoiseFilterConfig,
}

impl McpServer {
    pub fn new() -> Result<Self, MnemoError> {
        Self::with_components(ServerComponents::from_env()?)
    }

    pub fn with_components(components: ServerComponents) -> Result<Self, MnemoError> {
        let retriever = Retriever::new(
            components.store.clone(),
            components.embedder.clone(),
            components.reranker,
            components.retrieval_config,
        );
        Ok(Self {
            agent_id: components.agent_id,
            scopes: components.scopes,
            store: components.store,
            embedder: components.embedder,
            retriever,
            noise_filter: NoiseFilterConfig::default(),
        })
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                request.id.unwrap_or(Value::Null),
                -32600,
                "invalid jsonrpc version",
            ));
        }

        let is_notification = request.id.is_none();
        let id = request.id.clone().unwrap_or(Value::Null);
        info!(method = %request.method, "tool invocation");

        let response = match request.method.as_str() {
            "recall" => self.exec_recall(id, request.params).await,
            "store" => self.exec_store(id, request.params).await,
            "forget" => self.exec_forget(id, request.params).await,
            "update" => self.exec_update(id, request.params).await,
            "stats" => self.exec_stats(id, request.params).await,
            "list" => self.exec_list(id, request.params).await,
            _ => JsonRpcResponse::error(id, -32601, "unknown method"),
        };

        if is_notification {
            None
        } else {
            Some(response)
        }
    }

    fn resolve_write_scope(&self, requested: Option<String>) -> Result<String, MnemoError> {
        let scope = requested.unwrap_or_else(|| self.scopes.get_default_scope(&self.agent_id));
        if self.scopes.is_accessible(&scope, &self.agent_id) {
            Ok(scope)
        } else {
            Err(MnemoError::ScopeDenied {
                scope,
                agent_id: self.agent_id.clone(),
            })
        }
    }

    /// A filter a read (`recall`/`list`/`stats`/`forget`/`update`) may use:
    /// the single requested scope if accessible, otherwise every scope the
    /// agent can reach.
    fn resolve_read_scope_filter(&self, requested: Option<String>) -> Result<ScopeFilter, MnemoError> {
        match requested {
            Some(scope) if self.scopes.is_accessible(&scope, &self.agent_id) => Ok(ScopeFilter(vec![scope])),
            Some(scope) => Err(MnemoError::ScopeDenied {
                scope,
                agent_id: self.agent_id.clone(),
            }),
            None => Ok(ScopeFilter(
                self.scopes.get_accessible_scopes(&self.agent_id).into_iter().collect(),
            )),
        }
    }

    async fn store_blocking<F, T>(&self, f: F) -> Result<T, MnemoError>
    where
        F: FnOnce(&dyn MemoryStore) -> Result<T, MnemoError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        match tokio::task::spawn_blocking(move || f(store.as_ref())).await {
            Ok(result) => result,
            Err(e) => Err(MnemoError::EngineError(format!("store task panicked: {e}"))),
        }
    }

    async fn exec_recall(&self, id: Value, params: Value) -> JsonRpcResponse {
        #[derive(Deserialize)]
        struct Input {
            query: String,
            limit: Option<usize>,
            scope: Option<String>,
            category: Option<String>,
        }
        let args: Input = match parse_args(params) {
            Ok(v) => v,
            Err(msg) => return JsonRpcResponse::error(id, -32602, msg),
        };
        let category = match parse_category(args.category) {
            Ok(v) => v,
            Err(msg) => return JsonRpcResponse::error(id, -32602, msg),
        };
        let scope_filter = match self.resolve_read_scope_filter(args.scope) {
            Ok(v) => v,
            Err(e) => return error_response(id, &e),
        };

        let mut context = RetrievalContext::new(args.query, args.limit.unwrap_or(5));
        context.scope_filter = Some(scope_filter);
        context.category = category;

        match self.retriever.retrieve(context).await {
            Ok(results) => JsonRpcResponse::success(
                id,
                json!({
                    "structuredContent": {
                        "count": results.len(),
                        "items": results.iter().map(ranked_result_json).collect::<Vec<_>>(),
                    },
                    "content": [{
                        "type": "text",
                        "text": format!("Recalled {} entries.", results.len()),
                    }],
                }),
            ),
            Err(e) => error_response(id, &e),
        }
    }

    async fn exec_store(&self, id: Value, params: Value) -> JsonRpcResponse {
        #[derive(Deserialize)]
        struct Input {
            text: String,
            importance: Option<f32>,
            category: Option<String>,
            scope: Option<String>,
        }
        let args: Input = match parse_args(params) {
            Ok(v) => v,
            Err(msg) => return JsonRpcResponse::error(id, -32602, msg),
        };

        if is_noise(&args.text, &self.noise_filter) {
            return error_response(id, &MnemoError::Noise);
        }

        let category = match parse_category(args.category) {
            Ok(v) => v.unwrap_or(Category::Other),
            Err(msg) => return JsonRpcResponse::error(id, -32602, msg),
        };
        let scope = match self.resolve_write_scope(args.scope) {
            Ok(v) => v,
            Err(e) => return error_response(id, &e),
        };

        let vector = match self.embedder.embed_passage(&args.text).await {
            Ok(v) => v,
            Err(e) => return error_response(id, &embed_err(e)),
        };

        let dup_filter = ScopeFilter(vec![scope.clone()]);
        let probe = vector.clone();
        let duplicate = self
            .store_blocking(move |s| s.vector_search(&probe, 1, 0.1, Some(&dup_filter)))
            .await;
        match duplicate {
            Ok(hits) => {
                if let Some(top) = hits.first() {
                    if top.score > DUPLICATE_THRESHOLD {
                        return error_response(
                            id,
                            &MnemoError::Duplicate {
                                existing_id: top.record.id,
                                similarity: top.score,
                            },
                        );
                    }
                }
            }
            Err(e) => return error_response(id, &e),
        }

        let importance = args.importance.map_or(DEFAULT_IMPORTANCE, MemoryRecord::normalize_importance);
        let new_record = NewMemoryRecord {
            text: args.text,
            vector,
            category,
            scope,
            importance,
            metadata: "{}".to_string(),
        };

        match self.store_blocking(move |s| s.store(new_record)).await {
            Ok(record) => JsonRpcResponse::success(id, record_json(&record)),
            Err(e) => error_response(id, &e),
        }
    }

    async fn exec_forget(&self, id: Value, params: Value) -> JsonRpcResponse {
        #[derive(Deserialize)]
        struct Input {
            query: Option<String>,
            memory_id: Option<String>,
            scope: Option<String>,
        }
        let args: Input = match parse_args(params) {
            Ok(v) => v,
            Err(msg) => return JsonRpcResponse::error(id, -32602, msg),
        };

        if let Some(memory_id) = args.memory_id {
            let filter = match self.resolve_read_scope_filter(args.scope) {
                Ok(v) => v,
                Err(e) => return error_response(id, &e),
            };
            return match self.store_blocking(move |s| s.delete(&memory_id, Some(&filter))).await {
                Ok(deleted_id) => JsonRpcResponse::success(id, json!({"deleted": true, "id": deleted_id.to_string()})),
                Err(MnemoError::NotFound(_)) => JsonRpcResponse::success(id, json!({"deleted": false})),
                Err(e) => error_response(id, &e),
            };
        }

        let Some(query) = args.query else {
            return JsonRpcResponse::error(id, -32602, "forget requires query or memory_id");
        };
        let filter = match self.resolve_read_scope_filter(args.scope) {
            Ok(v) => v,
            Err(e) => return error_response(id, &e),
        };

        let mut context = RetrievalContext::new(query, 5);
        context.scope_filter = Some(filter.clone());
        let results = match self.retriever.retrieve(context).await {
            Ok(v) => v,
            Err(e) => return error_response(id, &e),
        };

        match results.as_slice() {
            [only] if only.score > FORGET_CONFIDENCE => {
                let id_to_delete = only.record.id.to_string();
                match self.store_blocking(move |s| s.delete(&id_to_delete, Some(&filter))).await {
                    Ok(deleted_id) => {
                        JsonRpcResponse::success(id, json!({"deleted": true, "id": deleted_id.to_string()}))
                    }
                    Err(e) => error_response(id, &e),
                }
            }
            _ => JsonRpcResponse::success(
                id,
                json!({
                    "deleted": false,
                    "candidates": results.iter().map(ranked_result_json).collect::<Vec<_>>(),
                    "message": "no single high-confidence match; call forget again with memory_id",
                }),
            ),
        }
    }

    async fn exec_update(&self, id: Value, params: Value) -> JsonRpcResponse {
        #[derive(Deserialize)]
        struct Input {
            memory_id: String,
            text: Option<String>,
            importance: Option<f32>,
            category: Option<String>,
        }
        let args: Input = match parse_args(params) {
            Ok(v) => v,
            Err(msg) => return JsonRpcResponse::error(id, -32602, msg),
        };

        if args.text.is_none() && args.importance.is_none() && args.category.is_none() {
            return JsonRpcResponse::error(id, -32602, "update requires at least one field to change");
        }
        let category = match parse_category(args.category) {
            Ok(v) => v,
            Err(msg) => return JsonRpcResponse::error(id, -32602, msg),
        };

        let resolved_id = if looks_like_identifier(&args.memory_id) {
            args.memory_id.clone()
        } else {
            match self.resolve_identifier_via_retrieval(&args.memory_id).await {
                Ok(v) => v,
                Err(e) => return error_response(id, &e),
            }
        };

        let vector = match &args.text {
            Some(text) if is_noise(text, &self.noise_filter) => return error_response(id, &MnemoError::Noise),
            Some(text) => match self.embedder.embed_passage(text).await {
                Ok(v) => Some(v),
                Err(e) => return error_response(id, &embed_err(e)),
            },
            None => None,
        };

        let fields = UpdateFields {
            text: args.text,
            vector,
            importance: args.importance.map(MemoryRecord::normalize_importance),
            category,
        };
        let filter = match self.resolve_read_scope_filter(None) {
            Ok(v) => v,
            Err(e) => return error_response(id, &e),
        };

        match self.store_blocking(move |s| s.update(&resolved_id, fields, Some(&filter))).await {
            Ok(record) => JsonRpcResponse::success(id, record_json(&record)),
            Err(e) => error_response(id, &e),
        }
    }

    /// Resolves a free-text `update` target via retrieval: unambiguous if
    /// there is exactly one result, or the top result clears the
    /// disambiguation confidence bar (spec §4.6).
    async fn resolve_identifier_via_retrieval(&self, query: &str) -> Result<String, MnemoError> {
        let filter = self.resolve_read_scope_filter(None)?;
        let mut context = RetrievalContext::new(query.to_string(), 5);
        context.scope_filter = Some(filter);
        let results = self.retriever.retrieve(context).await?;

        match results.as_slice() {
            [] => Err(MnemoError::NotFound(query.to_string())),
            [only] => Ok(only.record.id.to_string()),
            many => match many.first() {
                Some(top) if top.score > UPDATE_CONFIDENCE => Ok(top.record.id.to_string()),
                _ => Err(MnemoError::AmbiguousPrefix {
                    prefix: query.to_string(),
                    matches: many.len(),
                }),
            },
        }
    }

    async fn exec_stats(&self, id: Value, params: Value) -> JsonRpcResponse {
        #[derive(Deserialize)]
        struct Input {
            scope: Option<String>,
        }
        let args: Input = match parse_args(params) {
            Ok(v) => v,
            Err(msg) => return JsonRpcResponse::error(id, -32602, msg),
        };
        let filter = match self.resolve_read_scope_filter(args.scope) {
            Ok(v) => v,
            Err(e) => return error_response(id, &e),
        };
        match self.store_blocking(move |s| s.stats(Some(&filter))).await {
            Ok(stats) => JsonRpcResponse::success(id, json!(stats)),
            Err(e) => error_response(id, &e),
        }
    }

    async fn exec_list(&self, id: Value, params: Value) -> JsonRpcResponse {
        #[derive(Deserialize)]
        struct Input {
            limit: Option<usize>,
            scope: Option<String>,
            category: Option<String>,
            offset: Option<usize>,
        }
        let args: Input = match parse_args(params) {
            Ok(v) => v,
            Err(msg) => return JsonRpcResponse::error(id, -32602, msg),
        };
        let category = match parse_category(args.category) {
            Ok(v) => v,
            Err(msg) => return JsonRpcResponse::error(id, -32602, msg),
        };
        let filter = match self.resolve_read_scope_filter(args.scope) {
            Ok(v) => v,
            Err(e) => return error_response(id, &e),
        };
        let limit = args.limit.unwrap_or(20).clamp(1, 200);
        let offset = args.offset.unwrap_or(0);

        match self.store_blocking(move |s| s.list(Some(&filter), category, offset, limit)).await {
            Ok(records) => JsonRpcResponse::success(
                id,
                json!({
                    "count": records.len(),
                    "items": records.iter().map(record_json).collect::<Vec<_>>(),
                }),
            ),
            Err(e) => error_response(id, &e),
        }
    }

    pub async fn serve_stdio(&self) -> std::io::Result<()> {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();
        let mut stdout = tokio::io::stdout();

        while let Some(line) = lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(v) => v,
                Err(e) => {
                    let response = JsonRpcResponse::error(Value::Null, -32700, format!("parse error: {e}"));
                    write_line(&mut stdout, &response).await?;
                    continue;
                }
            };
            if let Some(response) = self.handle_request(request).await {
                write_line(&mut stdout, &response).await?;
            }
        }
        Ok(())
    }

    pub async fn serve_http(&self, addr: &str) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "mnemo-tools http listening");
        loop {
            let (mut stream, _) = listener.accept().await?;
            if let Err(err) = self.handle_http_connection(&mut stream).await {
                warn!(error = %err, "mnemo-tools http request error");
            }
        }
    }

    async fn handle_http_connection(&self, stream: &mut tokio::net::TcpStream) -> std::io::Result<()> {
        let Some(req) = read_http_request(stream).await? else {
            return Ok(());
        };
        let response = self.dispatch_http_request(req).await;
        write_http_response(stream, response).await
    }

    async fn dispatch_http_request(&self, req: HttpRequest) -> HttpResponse {
        if req.method == "GET" && req.path == "/health" {
            return HttpResponse::json(200, &json!({"status": "ok"}));
        }
        if req.method != "POST" {
            return HttpResponse::json(405, &json!({"error": "method not allowed"}));
        }
        let request: JsonRpcRequest = match serde_json::from_slice(&req.body) {
            Ok(v) => v,
            Err(e) => return HttpResponse::json(400, &json!({"error": format!("parse error: {e}")})),
        };
        match self.handle_request(request).await {
            Some(response) => HttpResponse::json(200, &response),
            None => HttpResponse::json(204, &Value::Null),
        }
    }
}

async fn write_line(stdout: &mut tokio::io::Stdout, response: &JsonRpcResponse) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;
    let serialized = serde_json::to_string(response).unwrap_or_else(|_| "{}".to_string());
    stdout.write_all(serialized.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}

fn parse_args<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, String> {
    serde_json::from_value(params).map_err(|e| format!("invalid params: {e}"))
}

fn parse_category(raw: Option<String>) -> Result<Option<Category>, String> {
    match raw {
        None => Ok(None),
        Some(s) => s.parse::<Category>().map(Some).map_err(|()| format!("invalid category: {s}")),
    }
}

fn error_response(id: Value, err: &MnemoError) -> JsonRpcResponse {
    JsonRpcResponse::error(id, error_code_for(err), err.to_string())
}

fn embed_err(e: mnemo_embed::error::ProviderError) -> MnemoError {
    match e {
        mnemo_embed::error::ProviderError::DimensionMismatch { expected, actual } => {
            MnemoError::DimensionMismatch { expected, actual }
        }
        other => MnemoError::RemoteService {
            status: None,
            detail: other.to_string(),
        },
    }
}

fn record_json(record: &MemoryRecord) -> Value {
    json!({
        "id": record.id.to_string(),
        "text": record.text,
        "category": record.category.as_str(),
        "scope": record.scope,
        "importance": record.importance,
        "timestamp": record.timestamp,
        "metadata": record.metadata,
    })
}

fn ranked_result_json(result: &RankedResult) -> Value {
    let mut value = record_json(&result.record);
    if let Some(obj) = value.as_object_mut() {
        obj.insert("score".to_string(), json!(result.score));
        obj.insert("vector_score".to_string(), json!(result.vector_score));
        obj.insert("bm25_score".to_string(), json!(result.bm25_score));
        obj.insert("reranker_score".to_string(), json!(result.reranker_score));
    }
    value
}

struct HttpRequest {
    method: String,
    path: String,
    body: Vec<u8>,
}

struct HttpResponse {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

impl HttpResponse {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }
}

async fn read_http_request(stream: &mut tokio::net::TcpStream) -> std::io::Result<Option<HttpRequest>> {
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let first = line.trim_end_matches(['\r', '\n']);
    if first.is_empty() {
        return Ok(None);
    }

    let mut parts = first.split_whitespace();
    let Some(method) = parts.next() else {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "missing http method"));
    };
    let Some(path_with_query) = parts.next() else {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "missing http path"));
    };
    let path = path_with_query.split('?').next().unwrap_or(path_with_query).to_string();
    let method = method.to_string();

    let mut content_length = 0usize;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).await? == 0 {
            break;
        }
        let header = header.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0_u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).await?;
    }
    Ok(Some(HttpRequest { method, path, body }))
}

async fn write_http_response(stream: &mut tokio::net::TcpStream, response: HttpResponse) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;
    let reason = http_reason_phrase(response.status);
    let headers = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        reason,
        response.content_type,
        response.body.len()
    );
    stream.write_all(headers.as_bytes()).await?;
    stream.write_all(&response.body).await?;
    stream.flush().await
}

fn http_reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "OK",
    }
}
