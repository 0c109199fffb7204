//! jstore - lightweight JSON document store
//!
//! Documents are JSON values stored one per directory, addressed by a UUID
//! and, inside a document, by JSON Pointer. Updates are whole-value puts,
//! JSON Merge Patches, or JSON Patch operation lists that may span several
//! documents and commit all-or-nothing.
//!
//! # Quick Start
//!
//! ```no_run
//! use jstore::{Credential, Precondition, Store};
//! use serde_json::json;
//!
//! let store = Store::open("./data")?;
//! let id = store.create(Some(json!({"b": ["x0"]})), Credential::Authenticated)?;
//!
//! let ops = json!([{"op": "add", "path": "/b/-", "value": "x"}]);
//! store.json_patch(Some(&id), "", &ops, Credential::Authenticated, &Precondition::none())?;
//!
//! let (value, etag) = store.get(&id, "/b", Credential::Anonymous)?;
//! assert_eq!(value, json!(["x0", "x"]));
//! # let _ = etag;
//! # Ok::<(), jstore::Error>(())
//! ```
//!
//! # Architecture
//!
//! - `jstore-core`: error taxonomy, ids, access policy, JSON Pointer engine
//! - `jstore-storage`: document and metadata caches over the data directory
//! - `jstore-concurrency`: optimistic multi-document transactions
//! - `jstore-engine`: the [`Store`] facade and patch orchestration

pub use jstore_concurrency::Transaction;
pub use jstore_core::{
    authorize, is_valid_doc_id, json, Access, AccessMode, Conflict, ContentHash, Credential,
    DocId, Error, Metadata, Result, Value, DOC_ID_LEN,
};
pub use jstore_engine::*;
pub use jstore_storage::{DocumentCache, MetadataCache};
