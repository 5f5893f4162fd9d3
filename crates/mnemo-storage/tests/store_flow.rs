use mnemo_core::error::MnemoError;
use mnemo_core::record::{Category, NewMemoryRecord};
use mnemo_storage::{JsonFileStore, MemoryStore, ScopeFilter, UpdateFields};

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

fn temp_db_path() -> std::path::PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut path = std::env::temp_dir();
    path.push(format!("mnemo-storage-test-{}-{}-{}.json", std::process::id(), nanos, n));
    path
}

#[test]
fn store_then_vector_and_bm25_search_round_trip() {
    let path = temp_db_path();
    let store = JsonFileStore::open(path.to_str().unwrap(), 4).unwrap();

    let stored = store
        .store(new_record("dark mode preference for the editor", "global", vec_for(1.0, 4)))
        .unwrap();
    store
        .store(new_record("favorite coffee order is a flat white", "global", vec_for(9.0, 4)))
        .unwrap();

    let by_vector = store.vector_search(&vec_for(1.0, 4), 5, 0.0, None).unwrap();
    assert_eq!(by_vector.first().unwrap().record.id, stored.id);

    let by_text = store.bm25_search("dark mode", 5, None).unwrap();
    assert_eq!(by_text.first().unwrap().record.id, stored.id);
    assert!(by_text.first().unwrap().record.text.contains("dark mode"));

    let _ = std::fs::remove_file(path);
}

#[test]
fn dimension_mismatch_is_rejected() {
    let path = temp_db_path();
    let store = JsonFileStore::open(path.to_str().unwrap(), 4).unwrap();
    store.store(new_record("first record", "global", vec_for(1.0, 4))).unwrap();

    let result = store.store(new_record("wrong dimension", "global", vec_for(1.0, 3)));
    assert!(matches!(
        result,
        Err(MnemoError::DimensionMismatch { expected: 4, actual: 3 })
    ));

    let _ = std::fs::remove_file(path);
}

#[test]
fn scope_filter_excludes_other_scopes() {
    let path = temp_db_path();
    let store = JsonFileStore::open(path.to_str().unwrap(), 4).unwrap();

    let global = store
        .store(new_record("shared note", "global", vec_for(1.0, 4)))
        .unwrap();
    store
        .store(new_record("project secret", "project:alpha", vec_for(1.1, 4)))
        .unwrap();

    let filter = ScopeFilter(vec!["global".to_string()]);
    let hits = store.vector_search(&vec_for(1.0, 4), 10, 0.0, Some(&filter)).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits.first().unwrap().record.id, global.id);

    let _ = std::fs::remove_file(path);
}

#[test]
fn update_replaces_fields_and_preserves_id_and_timestamp() {
    let path = temp_db_path();
    let store = JsonFileStore::open(path.to_str().unwrap(), 4).unwrap();
    let original = store
        .store(new_record("old text", "global", vec_for(1.0, 4)))
        .unwrap();

    let updated = store
        .update(
            &original.id.to_string(),
            UpdateFields {
                text: Some("new text".to_string()),
                ..Default::default()
            },
            None,
        )
        .unwrap();

    assert_eq!(updated.id, original.id);
    assert_eq!(updated.timestamp, original.timestamp);
    assert_eq!(updated.text, "new text");

    let _ = std::fs::remove_file(path);
}

#[test]
fn delete_by_unambiguous_prefix() {
    let path = temp_db_path();
    let store = JsonFileStore::open(path.to_str().unwrap(), 4).unwrap();
    let record = store.store(new_record("to be deleted", "global", vec_for(1.0, 4))).unwrap();

    let stripped: String = record.id.to_string().chars().filter(|c| *c != '-').collect();
    let prefix = stripped.get(..8).expect("id hex string is at least 8 chars");

    let deleted = store.delete(prefix, None).unwrap();
    assert_eq!(deleted, record.id);
    assert!(!store.has_id(record.id).unwrap());

    let _ = std::fs::remove_file(path);
}

#[test]
fn bulk_delete_requires_a_filter() {
    let path = temp_db_path();
    let store = JsonFileStore::open(path.to_str().unwrap(), 4).unwrap();
    store.store(new_record("anything", "global", vec_for(1.0, 4))).unwrap();

    let result = store.bulk_delete(None, None);
    assert!(matches!(result, Err(MnemoError::InvalidInput(_))));

    let _ = std::fs::remove_file(path);
}

#[test]
fn stats_reports_totals_by_scope_and_category() {
    let path = temp_db_path();
    let store = JsonFileStore::open(path.to_str().unwrap(), 4).unwrap();
    store.store(new_record("a", "global", vec_for(1.0, 4))).unwrap();
    store.store(new_record("b", "project:alpha", vec_for(2.0, 4))).unwrap();

    let stats = store.stats(None).unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(*stats.by_scope.get("global").unwrap(), 1);
    assert_eq!(*stats.by_scope.get("project:alpha").unwrap(), 1);

    let _ = std::fs::remove_file(path);
}
