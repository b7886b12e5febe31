use super::*;

fn temp_path(name: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("growpromise-{name}-{}-{nanos}.json", std::process::id()))
}

// =============================================================================
// MemoryStore
// =============================================================================

#[tokio::test]
async fn memory_set_get_remove() {
    let store = MemoryStore::new();
    assert_eq!(store.get("a").await.unwrap(), None);
    store.set("a", "1").await.unwrap();
    assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
    store.remove("a").await.unwrap();
    assert_eq!(store.get("a").await.unwrap(), None);
}

#[tokio::test]
async fn memory_get_many_preserves_order() {
    let store = MemoryStore::new();
    store.insert("b", "2");
    store.insert("a", "1");
    let values = store.get_many(&["a", "missing", "b"]).await.unwrap();
    assert_eq!(values, vec![Some("1".to_owned()), None, Some("2".to_owned())]);
}

#[tokio::test]
async fn memory_injected_write_failure() {
    let store = MemoryStore::new();
    store.fail_writes_to("user_id");
    assert!(store.set("auth_token", "t").await.is_ok());
    let err = store.set("user_id", "1").await.unwrap_err();
    assert!(matches!(err, StorageError::Write { ref key, .. } if key == "user_id"));
    assert_eq!(store.keys(), vec!["auth_token".to_owned()]);
}

#[tokio::test]
async fn memory_injected_read_failure() {
    let store = MemoryStore::new();
    store.insert("a", "1");
    store.fail_reads(true);
    assert!(store.get("a").await.is_err());
    store.fail_reads(false);
    assert!(store.get("a").await.is_ok());
}

#[tokio::test]
async fn remove_many_clears_all_keys() {
    let store = MemoryStore::new();
    for key in ["a", "b", "c"] {
        store.insert(key, "x");
    }
    store.remove_many(&["a", "c"]).await.unwrap();
    assert_eq!(store.keys(), vec!["b".to_owned()]);
}

// =============================================================================
// FileStore
// =============================================================================

#[tokio::test]
async fn file_store_missing_file_reads_empty() {
    let store = FileStore::new(temp_path("missing"));
    assert_eq!(store.get("auth_token").await.unwrap(), None);
}

#[tokio::test]
async fn file_store_persists_across_instances() {
    let path = temp_path("persist");
    {
        let store = FileStore::new(&path);
        store.set("username", "mom").await.unwrap();
        store.set("user_type", "PARENT").await.unwrap();
    }
    let reopened = FileStore::new(&path);
    assert_eq!(reopened.get("username").await.unwrap().as_deref(), Some("mom"));
    reopened.remove("username").await.unwrap();
    assert_eq!(reopened.get("username").await.unwrap(), None);
    assert_eq!(reopened.get("user_type").await.unwrap().as_deref(), Some("PARENT"));
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn file_store_corrupt_file_errors() {
    let path = temp_path("corrupt");
    std::fs::write(&path, b"not json").unwrap();
    let store = FileStore::new(&path);
    assert!(matches!(store.get("a").await, Err(StorageError::Corrupt(_))));
    let _ = std::fs::remove_file(&path);
}
