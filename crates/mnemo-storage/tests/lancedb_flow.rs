#![cfg(feature = "lancedb-backend")]

use mnemo_core::record::{Category, NewMemoryRecord};
use mnemo_storage::{LanceDbStore, MemoryStore, ScopeFilter};

fn vec_for(seed: f32, dim: usize) -> Vec<f32> {
    (0..dim).map(|i| seed + i as f32 * 0.01).collect()
}

fn new_record(text: &str, scope: &str, vector: Vec<f32>) -> NewMemoryRecord {
    NewMemoryRecord {
        text: text.to_string(),
        vector,
        category: Category::Fact,
        scope: scope.to_string(),
        importance: 0.5,
        metadata: "{}".to_string(),
    }
}

fn temp_db_dir() -> std::path::PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut path = std::env::temp_dir();
    path.push(format!("mnemo-storage-lancedb-{}-{}-{}.lance", std::process::id(), nanos, n));
    path
}

#[test]
fn store_then_vector_and_fts_search_round_trip() {
    let dir = temp_db_dir();
    let store = LanceDbStore::open(dir.to_str().unwrap()).unwrap();

    let stored = store
        .store(new_record("dark mode preference for the editor", "global", vec_for(1.0, 4)))
        .unwrap();
    store
        .store(new_record("favorite coffee order is a flat white", "global", vec_for(9.0, 4)))
        .unwrap();

    let by_vector = store.vector_search(&vec_for(1.0, 4), 5, 0.0, None).unwrap();
    assert_eq!(by_vector.first().unwrap().record.id, stored.id);

    if store.has_fts_support() {
        let by_text = store.bm25_search("dark mode", 5, None).unwrap();
        assert!(by_text.iter().any(|hit| hit.record.id == stored.id));
    }

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn scope_filter_excludes_other_scopes() {
    let dir = temp_db_dir();
    let store = LanceDbStore::open(dir.to_str().unwrap()).unwrap();

    let global = store.store(new_record("shared note", "global", vec_for(1.0, 4))).unwrap();
    store
        .store(new_record("project secret", "project:alpha", vec_for(1.1, 4)))
        .unwrap();

    let filter = ScopeFilter(vec!["global".to_string()]);
    let hits = store.vector_search(&vec_for(1.0, 4), 10, 0.0, Some(&filter)).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits.first().unwrap().record.id, global.id);

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn delete_removes_the_record() {
    let dir = temp_db_dir();
    let store = LanceDbStore::open(dir.to_str().unwrap()).unwrap();
    let record = store.store(new_record("to be deleted", "global", vec_for(1.0, 4))).unwrap();

    let deleted = store.delete(&record.id.to_string(), None).unwrap();
    assert_eq!(deleted, record.id);
    assert!(!store.has_id(record.id).unwrap());

    let _ = std::fs::remove_dir_all(dir);
}
