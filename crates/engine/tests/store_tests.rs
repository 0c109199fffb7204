//! Store lifecycle and concurrency tests for jstore-engine
//!
//! Covers:
//! - open / reopen of a data directory, including `jstore.toml`
//! - create, get and put semantics, access levels and preconditions
//! - concurrent patch requests against one store

use std::fs;
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use jstore_core::{is_valid_doc_id, Access, Credential, Error, Metadata};
use jstore_engine::{Precondition, Store, StoreConfig, CONFIG_FILE_NAME};
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// Open / reopen
// ============================================================================

#[test]
fn test_reopen_preserves_documents() {
    let dir = TempDir::new().unwrap();
    let id = {
        let store = Store::open(dir.path()).unwrap();
        store
            .create(Some(json!({"kept": true})), Credential::Authenticated)
            .unwrap()
    };

    let store = Store::open(dir.path()).unwrap();
    assert_eq!(
        store.get(&id, "/kept", Credential::Anonymous).unwrap().0,
        json!(true)
    );
    assert_eq!(
        store.metadata(id.as_str()).unwrap(),
        Some(Metadata::new(id, Access::Protected))
    );
}

#[test]
fn test_open_reads_edited_config() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "default_access = \"public\"\nmetadata_cache_entries = 4\n",
    )
    .unwrap();

    let store = Store::open(dir.path()).unwrap();
    assert_eq!(store.config().metadata_cache_entries, 4);
    store.create(None, Credential::Anonymous).unwrap();
}

#[test]
fn test_open_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(CONFIG_FILE_NAME), "default_access = \"nobody\"\n").unwrap();
    assert!(matches!(Store::open(dir.path()), Err(Error::Config(_))));
}

#[test]
fn test_data_layout_on_disk() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let id = store
        .create(Some(json!({"b": 1, "a": [true]})), Credential::Authenticated)
        .unwrap();

    let doc_dir = dir.path().join(id.as_str());
    assert_eq!(
        fs::read_to_string(doc_dir.join("data.json")).unwrap(),
        r#"{"a":[true],"b":1}"#
    );
    assert_eq!(
        fs::read_to_string(doc_dir.join("meta.json")).unwrap(),
        format!(r#"{{"id":"{}","access":"protected"}}"#, id)
    );
}

// ============================================================================
// Create / get / put
// ============================================================================

#[test]
fn test_create_empty_then_get_null() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path()).unwrap();

    let id = store.create(None, Credential::Authenticated).unwrap();
    assert!(is_valid_doc_id(id.as_str()));
    assert_eq!(store.get(&id, "", Credential::Anonymous).unwrap().0, json!(null));
}

#[test]
fn test_put_then_get_pointer() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let id = store.create(None, Credential::Authenticated).unwrap();

    store
        .put(&id, "", json!({"a": 1}), Credential::Authenticated, &Precondition::none())
        .unwrap();
    assert_eq!(store.get(&id, "/a", Credential::Anonymous).unwrap().0, json!(1));
}

#[test]
fn test_get_errors() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let id = store
        .create(Some(json!({"a": 1})), Credential::Authenticated)
        .unwrap();

    let missing = store.get(&id, "/b", Credential::Anonymous).unwrap_err();
    assert_eq!(missing.status_code(), 404);
    let scalar = store.get(&id, "/a/b", Credential::Anonymous).unwrap_err();
    assert!(matches!(scalar, Error::TypeMismatch { .. }));
    let bad = store.get(&id, "a", Credential::Anonymous).unwrap_err();
    assert!(matches!(bad, Error::InvalidPointer { .. }));

    let unknown = jstore_core::DocId::generate();
    assert!(store
        .get(&unknown, "", Credential::Authenticated)
        .unwrap_err()
        .is_not_found());
}

#[test]
fn test_private_looks_missing() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let id = store.create(None, Credential::Authenticated).unwrap();
    store
        .set_access(&id, Access::Private, Credential::Authenticated)
        .unwrap();

    let hidden = store.get(&id, "", Credential::Anonymous).unwrap_err();
    let missing = store
        .get(&jstore_core::DocId::generate(), "", Credential::Anonymous)
        .unwrap_err();
    assert_eq!(hidden.status_code(), missing.status_code());
    store.get(&id, "", Credential::Authenticated).unwrap();
}

#[test]
fn test_put_if_unmodified_since() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let id = store.create(None, Credential::Authenticated).unwrap();

    let stale = Utc::now() - chrono::Duration::minutes(5);
    let err = store
        .put(
            &id,
            "",
            json!(1),
            Credential::Authenticated,
            &Precondition::if_unmodified_since(stale),
        )
        .unwrap_err();
    assert_eq!(err.status_code(), 412);

    let later = Utc::now() + chrono::Duration::minutes(5);
    store
        .put(
            &id,
            "",
            json!(1),
            Credential::Authenticated,
            &Precondition::if_unmodified_since(later),
        )
        .unwrap();
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_appends_all_land_with_retry() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 10;

    let dir = TempDir::new().unwrap();
    let store = Arc::new(Store::open(dir.path()).unwrap());
    let id = store
        .create(Some(json!({"log": []})), Credential::Authenticated)
        .unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            let id = id.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let ops = json!([{"op": "add", "path": "/log/-", "value": format!("{}-{}", t, i)}]);
                    loop {
                        match store.json_patch(
                            Some(&id),
                            "",
                            &ops,
                            Credential::Authenticated,
                            &Precondition::none(),
                        ) {
                            Ok(()) => break,
                            Err(e) if e.is_precondition_failed() => continue,
                            Err(e) => panic!("unexpected error: {}", e),
                        }
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let log = store.get(&id, "/log", Credential::Anonymous).unwrap().0;
    let entries = log.as_array().unwrap();
    let mut unique: Vec<_> = entries.iter().map(|v| v.as_str().unwrap().to_string()).collect();
    unique.sort();
    unique.dedup();
    assert_eq!(entries.len(), THREADS * PER_THREAD);
    assert_eq!(unique.len(), entries.len());
}
