use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use mnemo_core::scope::{ScopeConfig, ScopeManager};
use mnemo_embed::client::EmbeddingClient;
use mnemo_embed::error::ProviderError;
use mnemo_embed::traits::EmbeddingProvider;
use mnemo_embed::types::{EmbeddingRequest, EmbeddingResponse};
use mnemo_retriever::RetrievalConfig;
use mnemo_storage::{JsonFileStore, MemoryStore};
use mnemo_tools::{JsonRpcRequest, McpServer, ServerComponents};

const DIM: usize = 4;

/// An embedding stub with no real semantics: each test text carries one of
/// four keywords, mapped to fixed orthogonal vectors, giving deterministic
/// vector search behavior without a network round-trip.
struct KeywordEmbedder;

fn vector_for(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    if lower.contains("alpha") {
        vec![1.0, 0.0, 0.0, 0.0]
    } else if lower.contains("beta") {
        vec![0.0, 1.0, 0.0, 0.0]
    } else if lower.contains("gamma") {
        vec![0.0, 0.0, 1.0, 0.0]
    } else {
        vec![0.0, 0.0, 0.0, 1.0]
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn name(&self) -> &'static str {
        "keyword-stub"
    }

    fn model(&self) -> &str {
        "keyword-stub-v1"
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        let vectors = request.inputs.iter().map(|t| vector_for(t)).collect();
        Ok(EmbeddingResponse {
            provider: "keyword-stub".to_string(),
            model: "keyword-stub-v1".to_string(),
            vectors,
        })
    }
}

fn temp_db_path() -> std::path::PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut path = std::env::temp_dir();
    path.push(format!("mnemo-tools-test-{}-{}-{}.json", std::process::id(), nanos, n));
    path
}

fn default_scopes() -> ScopeManager {
    ScopeManager::new(ScopeConfig::new("global"))
}

fn multi_scope_scopes() -> ScopeManager {
    let config = ScopeConfig::new("global")
        .with_scope("project:x")
        .with_agent_access("test-agent", ["global".to_string(), "project:x".to_string()]);
    ScopeManager::new(config)
}

fn build_server(path: &std::path::Path, scopes: ScopeManager) -> McpServer {
    let store: Arc<dyn MemoryStore> = Arc::new(JsonFileStore::open(path.to_str().unwrap(), DIM).unwrap());
    let embedder = Arc::new(EmbeddingClient::new(Arc::new(KeywordEmbedder), DIM));
    let components = ServerComponents {
        agent_id: "test-agent".to_string(),
        scopes,
        store,
        embedder,
        reranker: None,
        retrieval_config: RetrievalConfig::default(),
    };
    McpServer::with_components(components).unwrap()
}

fn req(id: i64, method: &str, params: Value) -> JsonRpcRequest {
    serde_json::from_value(json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    }))
    .unwrap()
}

fn result_field<'a>(response: &'a mnemo_tools::JsonRpcResponse, field: &str) -> &'a Value {
    response
        .result
        .as_ref()
        .expect("expected a result, not an error")
        .get(field)
        .expect("missing field in result")
}

/// `recall` nests its machine-readable payload under `structuredContent`
/// alongside a human-readable `content` summary.
fn structured_field<'a>(response: &'a mnemo_tools::JsonRpcResponse, field: &str) -> &'a Value {
    response
        .result
        .as_ref()
        .expect("expected a result, not an error")
        .get("structuredContent")
        .expect("missing structuredContent in result")
        .get(field)
        .expect("missing field in structuredContent")
}

#[tokio::test]
async fn store_then_recall_round_trip() {
    let path = temp_db_path();
    let server = build_server(&path, default_scopes());

    let stored = server
        .handle_request(req(
            1,
            "store",
            json!({"text": "the alpha team prefers dark mode in the editor"}),
        ))
        .await
        .unwrap();
    assert!(stored.error.is_none(), "store failed: {:?}", stored.error);

    let recalled = server
        .handle_request(req(2, "recall", json!({"query": "alpha team preferences"})))
        .await
        .unwrap();
    assert_eq!(*structured_field(&recalled, "count"), json!(1));
    let items = structured_field(&recalled, "items").as_array().unwrap();
    assert_eq!(items.len(), 1);
    let top = items.first().unwrap();
    assert!(top.get("text").unwrap().as_str().unwrap().contains("alpha"));

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn store_rejects_noise_text() {
    let path = temp_db_path();
    let server = build_server(&path, default_scopes());

    let response = server.handle_request(req(1, "store", json!({"text": "ok"}))).await.unwrap();
    let error = response.error.expect("noise text should be rejected");
    assert_eq!(error.code, -32004);

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn store_rejects_near_duplicate() {
    let path = temp_db_path();
    let server = build_server(&path, default_scopes());

    let first = server
        .handle_request(req(
            1,
            "store",
            json!({"text": "the alpha team prefers dark mode in the editor"}),
        ))
        .await
        .unwrap();
    assert!(first.error.is_none());

    let second = server
        .handle_request(req(
            2,
            "store",
            json!({"text": "the alpha team prefers dark mode in their editor setup"}),
        ))
        .await
        .unwrap();
    let error = second.error.expect("near-duplicate store should be rejected");
    assert_eq!(error.code, -32003);

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn scope_isolation_blocks_writes_to_inaccessible_scopes() {
    let path = temp_db_path();
    let restricted = ScopeManager::new(
        ScopeConfig::new("global").with_agent_access("test-agent", ["global".to_string()]),
    );
    let server = build_server(&path, restricted);

    let response = server
        .handle_request(req(
            1,
            "store",
            json!({"text": "beta release notes mention a new caching layer", "scope": "project:x"}),
        ))
        .await
        .unwrap();
    let error = response.error.expect("write to an inaccessible scope should be denied");
    assert_eq!(error.code, -32001);

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn forget_by_id_deletes_the_record() {
    let path = temp_db_path();
    let server = build_server(&path, default_scopes());

    let stored = server
        .handle_request(req(
            1,
            "store",
            json!({"text": "gamma project roadmap review happens every week"}),
        ))
        .await
        .unwrap();
    let id = result_field(&stored, "id").as_str().unwrap().to_string();

    let forgotten = server
        .handle_request(req(2, "forget", json!({"memory_id": id})))
        .await
        .unwrap();
    assert_eq!(*result_field(&forgotten, "deleted"), json!(true));

    let listed = server.handle_request(req(3, "list", json!({}))).await.unwrap();
    assert_eq!(*result_field(&listed, "count"), json!(0));

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn forget_by_query_on_an_empty_store_returns_no_candidates() {
    let path = temp_db_path();
    let server = build_server(&path, default_scopes());

    let response = server
        .handle_request(req(1, "forget", json!({"query": "anything at all"})))
        .await
        .unwrap();
    assert_eq!(*result_field(&response, "deleted"), json!(false));
    assert_eq!(result_field(&response, "candidates").as_array().unwrap().len(), 0);

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn forget_requires_query_or_memory_id() {
    let path = temp_db_path();
    let server = build_server(&path, default_scopes());

    let response = server.handle_request(req(1, "forget", json!({}))).await.unwrap();
    assert!(response.error.is_some());

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn update_changes_text_and_category() {
    let path = temp_db_path();
    let server = build_server(&path, default_scopes());

    let stored = server
        .handle_request(req(
            1,
            "store",
            json!({"text": "beta release notes mention a new caching layer", "category": "fact"}),
        ))
        .await
        .unwrap();
    let id = result_field(&stored, "id").as_str().unwrap().to_string();

    let updated = server
        .handle_request(req(
            2,
            "update",
            json!({"memory_id": id, "text": "beta release notes now mention a rewritten caching layer", "category": "decision"}),
        ))
        .await
        .unwrap();
    assert!(updated.error.is_none(), "update failed: {:?}", updated.error);
    assert_eq!(*result_field(&updated, "category"), json!("decision"));
    assert!(result_field(&updated, "text").as_str().unwrap().contains("rewritten"));

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn update_requires_at_least_one_field_to_change() {
    let path = temp_db_path();
    let server = build_server(&path, default_scopes());

    let response = server
        .handle_request(req(1, "update", json!({"memory_id": "00000000-0000-0000-0000-000000000000"})))
        .await
        .unwrap();
    let error = response.error.expect("update with no mutating field should be rejected");
    assert_eq!(error.code, -32602);

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn stats_and_list_span_every_accessible_scope() {
    let path = temp_db_path();
    let server = build_server(&path, multi_scope_scopes());

    server
        .handle_request(req(
            1,
            "store",
            json!({"text": "the alpha team prefers dark mode in the editor", "scope": "global"}),
        ))
        .await
        .unwrap();
    server
        .handle_request(req(
            2,
            "store",
            json!({"text": "beta release notes mention a new caching layer", "scope": "project:x"}),
        ))
        .await
        .unwrap();

    let stats = server.handle_request(req(3, "stats", json!({}))).await.unwrap();
    assert_eq!(*result_field(&stats, "total"), json!(2));

    let listed = server.handle_request(req(4, "list", json!({}))).await.unwrap();
    assert_eq!(*result_field(&listed, "count"), json!(2));

    let scoped = server
        .handle_request(req(5, "list", json!({"scope": "project:x"})))
        .await
        .unwrap();
    assert_eq!(*result_field(&scoped, "count"), json!(1));

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn notifications_receive_no_response() {
    let path = temp_db_path();
    let server = build_server(&path, default_scopes());

    let notification: JsonRpcRequest = serde_json::from_value(json!({
        "jsonrpc": "2.0",
        "method": "list",
        "params": {},
    }))
    .unwrap();
    assert!(server.handle_request(notification).await.is_none());

    let _ = std::fs::remove_file(path);
}
