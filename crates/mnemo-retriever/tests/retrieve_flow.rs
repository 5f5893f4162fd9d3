use std::sync::Arc;

use async_trait::async_trait;

use mnemo_core::error::MnemoError;
use mnemo_core::record::{Category, NewMemoryRecord};
use mnemo_embed::client::EmbeddingClient;
use mnemo_embed::error::ProviderError;
use mnemo_embed::traits::EmbeddingProvider;
use mnemo_embed::types::{EmbeddingRequest, EmbeddingResponse};
use mnemo_retriever::{RetrievalConfig, RetrievalContext, Retriever};
use mnemo_storage::{JsonFileStore, MemoryStore, ScopeFilter};

const DIM: usize = 4;

/// An embedding stub with no real semantics: it maps a handful of known
/// keywords to fixed, near-orthogonal vectors, giving deterministic vector
/// search behavior without a network round-trip.
struct KeywordEmbedder;

fn vector_for(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    if lower.contains("alpha") {
        vec![1.0, 0.0, 0.0, 0.0]
    } else if lower.contains("beta") {
        vec![0.0, 1.0, 0.0, 0.0]
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
    path.push(format!("mnemo-retriever-test-{}-{}-{}.json", std::process::id(), nanos, n));
    path
}

fn build_retriever(store: Arc<dyn MemoryStore>) -> Retriever {
    let embedder = Arc::new(EmbeddingClient::new(Arc::new(KeywordEmbedder), DIM));
    Retriever::new(store, embedder, None, RetrievalConfig::default())
}

fn populate(store: &dyn MemoryStore) {
    store
        .store(NewMemoryRecord {
            text: "the alpha team prefers dark mode in the editor".to_string(),
            vector: vector_for("alpha"),
            category: Category::Preference,
            scope: "global".to_string(),
            importance: 0.8,
            metadata: "{}".to_string(),
        })
        .unwrap();
    store
        .store(NewMemoryRecord {
            text: "beta release notes mention a new caching layer".to_string(),
            vector: vector_for("beta"),
            category: Category::Fact,
            scope: "project:x".to_string(),
            importance: 0.5,
            metadata: "{}".to_string(),
        })
        .unwrap();
    store
        .store(NewMemoryRecord {
            text: "unrelated note about lunch plans for later today".to_string(),
            vector: vector_for("gamma"),
            category: Category::Other,
            scope: "global".to_string(),
            importance: 0.3,
            metadata: "{}".to_string(),
        })
        .unwrap();
}

#[tokio::test]
async fn retrieve_ranks_the_vector_match_first() {
    let path = temp_db_path();
    let store: Arc<dyn MemoryStore> = Arc::new(JsonFileStore::open(path.to_str().unwrap(), DIM).unwrap());
    populate(store.as_ref());

    let retriever = build_retriever(store);
    let results = retriever
        .retrieve(RetrievalContext::new("alpha team preferences", 5))
        .await
        .unwrap();

    let top = results.first().unwrap();
    assert!(top.record.text.contains("alpha"));
    assert!(top.vector_score.is_some());

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn retrieve_honors_scope_filter() {
    let path = temp_db_path();
    let store: Arc<dyn MemoryStore> = Arc::new(JsonFileStore::open(path.to_str().unwrap(), DIM).unwrap());
    populate(store.as_ref());

    let retriever = build_retriever(store);
    let mut context = RetrievalContext::new("beta release notes", 5);
    context.scope_filter = Some(ScopeFilter(vec!["global".to_string()]));

    let results = retriever.retrieve(context).await.unwrap();
    assert!(results.iter().all(|r| r.record.scope == "global"));

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn retrieve_honors_category_filter() {
    let path = temp_db_path();
    let store: Arc<dyn MemoryStore> = Arc::new(JsonFileStore::open(path.to_str().unwrap(), DIM).unwrap());
    populate(store.as_ref());

    let retriever = build_retriever(store);
    let mut context = RetrievalContext::new("alpha team preferences", 5);
    context.category = Some(Category::Fact);

    let results = retriever.retrieve(context).await.unwrap();
    assert!(results.iter().all(|r| r.record.category == Category::Fact));

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn retrieve_is_deterministic_given_identical_inputs() {
    let path = temp_db_path();
    let store: Arc<dyn MemoryStore> = Arc::new(JsonFileStore::open(path.to_str().unwrap(), DIM).unwrap());
    populate(store.as_ref());

    let retriever = build_retriever(store);
    let context = || RetrievalContext::new("alpha team preferences", 5);

    let first = retriever.retrieve(context()).await.unwrap();
    let second = retriever.retrieve(context()).await.unwrap();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.record.id, b.record.id);
        assert!((a.score - b.score).abs() < 1e-6);
    }

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn embedding_failure_propagates_as_an_error() {
    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        fn name(&self) -> &'static str {
            "failing-stub"
        }

        fn model(&self) -> &str {
            "failing-stub-v1"
        }

        async fn embed(&self, _request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            Err(ProviderError::Api {
                status: 503,
                body: "down for maintenance".to_string(),
            })
        }
    }

    let path = temp_db_path();
    let store: Arc<dyn MemoryStore> = Arc::new(JsonFileStore::open(path.to_str().unwrap(), DIM).unwrap());
    let embedder = Arc::new(EmbeddingClient::new(Arc::new(FailingEmbedder), DIM));
    let retriever = Retriever::new(store, embedder, None, RetrievalConfig::default());

    let result = retriever.retrieve(RetrievalContext::new("alpha team preferences", 5)).await;
    assert!(matches!(result, Err(MnemoError::RemoteService { .. })));

    let _ = std::fs::remove_file(path);
}
