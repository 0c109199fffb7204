//! End-to-end scenarios through the public `jstore` API
//!
//! Each test opens a fresh data directory and plays one request sequence as
//! an HTTP front end would issue it.

use jstore::{
    is_valid_doc_id, Access, Credential, Error, PatchKind, Precondition, Store, Transaction,
};
use serde_json::json;
use tempfile::TempDir;

fn open() -> (TempDir, Store) {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path()).unwrap();
    (dir, store)
}

#[test]
fn create_get_put_patch_sequence() {
    let (_dir, store) = open();
    let auth = Credential::Authenticated;
    let none = Precondition::none();

    // Create an empty document; it reads back as null.
    let id = store.create(None, auth).unwrap();
    assert!(is_valid_doc_id(id.as_str()));
    assert_eq!(store.get(&id, "", auth).unwrap().0, json!(null));

    // Put a body and read a pointer into it.
    store.put(&id, "", json!({"a": 1}), auth, &none).unwrap();
    assert_eq!(store.get(&id, "/a", auth).unwrap().0, json!(1));

    // Append through an op list.
    store.put(&id, "", json!({"b": ["x0"]}), auth, &none).unwrap();
    store
        .patch(
            Some(&id),
            "",
            &json!([{"op": "add", "path": "/b/-", "value": "x"}]),
            None,
            auth,
            &none,
        )
        .unwrap();
    assert_eq!(store.get(&id, "", auth).unwrap().0, json!({"b": ["x0", "x"]}));

    // Merge patch removes a key.
    store.put(&id, "", json!({"c": 1, "d": 2}), auth, &none).unwrap();
    store
        .patch(
            Some(&id),
            "",
            &json!({"c": null}),
            Some(PatchKind::MergePatch),
            auth,
            &none,
        )
        .unwrap();
    assert_eq!(store.get(&id, "", auth).unwrap().0, json!({"d": 2}));
}

#[test]
fn failed_test_op_leaves_document_untouched() {
    let (_dir, store) = open();
    let auth = Credential::Authenticated;
    let id = store.create(Some(json!({"a": 1})), auth).unwrap();
    let (before, etag) = store.get(&id, "", auth).unwrap();

    let ops = json!([
        {"op": "add", "path": "/added", "value": true},
        {"op": "test", "path": "/a", "value": 2},
    ]);
    let err = store
        .json_patch(Some(&id), "", &ops, auth, &Precondition::none())
        .unwrap_err();
    assert_eq!(err.status_code(), 412);
    assert!(matches!(err, Error::ValueMismatch { .. }));

    let (after, etag_after) = store.get(&id, "", auth).unwrap();
    assert_eq!(after, before);
    assert_eq!(etag_after, etag);
}

#[test]
fn etag_guards_concurrent_editors() {
    let (_dir, store) = open();
    let auth = Credential::Authenticated;
    let id = store.create(Some(json!({"title": "draft"})), auth).unwrap();

    // Two editors read the same version.
    let (_, etag_one) = store.get(&id, "", auth).unwrap();
    let (_, etag_two) = store.get(&id, "", auth).unwrap();
    assert_eq!(etag_one, etag_two);

    store
        .put(&id, "/title", json!("first"), auth, &Precondition::if_match(etag_one))
        .unwrap();
    let err = store
        .put(&id, "/title", json!("second"), auth, &Precondition::if_match(etag_two))
        .unwrap_err();
    assert!(err.is_precondition_failed());
    assert_eq!(store.get(&id, "/title", auth).unwrap().0, json!("first"));
}

#[test]
fn transaction_conflict_spans_documents() {
    let (dir, store) = open();
    let auth = Credential::Authenticated;
    let d = store.create(Some(json!(1)), auth).unwrap();
    let e = store.create(Some(json!(2)), auth).unwrap();

    // A raw cache over the same directory stands in for a second writer path.
    let docs = jstore::DocumentCache::new(dir.path(), 1 << 20);
    let mut txn = Transaction::new(&docs);
    txn.get(&d).unwrap();
    txn.put(d.clone(), json!(10));
    txn.put(e.clone(), json!(20));

    let mut other = Transaction::new(&docs);
    other.put(d.clone(), json!(99));
    other.commit().unwrap();

    assert!(txn.commit().unwrap_err().is_precondition_failed());
    assert_eq!(*docs.get(&e).unwrap().0, json!(2));
    assert_eq!(*docs.get(&d).unwrap().0, json!(99));
}

#[test]
fn access_levels_end_to_end() {
    let (_dir, store) = open();
    let id = store.create(Some(json!({"x": 1})), Credential::Authenticated).unwrap();
    let anon = Credential::Anonymous;

    // Protected by default: readable, not writable.
    store.get(&id, "/x", anon).unwrap();
    let err = store
        .put(&id, "/x", json!(2), anon, &Precondition::none())
        .unwrap_err();
    assert_eq!(err.status_code(), 401);

    store
        .set_access(&id, Access::Private, Credential::Authenticated)
        .unwrap();
    assert_eq!(store.get(&id, "/x", anon).unwrap_err().status_code(), 404);

    store
        .set_access(&id, Access::Public, Credential::Authenticated)
        .unwrap();
    store.put(&id, "/x", json!(3), anon, &Precondition::none()).unwrap();
    assert_eq!(store.get(&id, "/x", anon).unwrap().0, json!(3));
}
