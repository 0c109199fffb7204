//! Store: the public facade over both caches
//!
//! Every request-level operation lives here: create, read, overwrite, merge
//! patch and JSON Patch. Access checks run against the metadata cache with
//! the caller's [`Credential`]; writes go through a [`Transaction`] so
//! caller-supplied preconditions and read hashes are checked together.
//!
//! # Example
//!
//! ```no_run
//! use jstore_engine::{Precondition, Store};
//! use jstore_core::Credential;
//! use serde_json::json;
//!
//! let store = Store::open("./data")?;
//! let id = store.create(Some(json!({"a": 1})), Credential::Authenticated)?;
//! let (value, etag) = store.get(&id, "/a", Credential::Anonymous)?;
//! assert_eq!(value, json!(1));
//!
//! store.put(&id, "/a", json!(2), Credential::Authenticated, &Precondition::if_match(etag))?;
//! # Ok::<(), jstore_core::Error>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use jstore_concurrency::Transaction;
use jstore_core::{
    authorize, json, Access, AccessMode, ContentHash, Credential, DocId, Error, Metadata, Result,
    Value,
};
use jstore_storage::{DocumentCache, MetadataCache};
use tracing::{debug, info};

use crate::access::{AccessCheck, MetadataAccess};
use crate::config::{StoreConfig, CONFIG_FILE_NAME};
use crate::patch::{apply_merge, apply_operations, parse_operations, PatchKind};

/// Conditions the request document must meet for a write to commit
///
/// Carries the external layer's `If-Match` / `If-Unmodified-Since`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Precondition {
    /// Required content hash of the request document
    pub if_match: Option<ContentHash>,
    /// The request document must not have changed after this time
    pub if_unmodified_since: Option<DateTime<Utc>>,
}

impl Precondition {
    /// No conditions
    pub fn none() -> Self {
        Self::default()
    }

    /// Require a content hash
    pub fn if_match(hash: ContentHash) -> Self {
        Self {
            if_match: Some(hash),
            ..Self::default()
        }
    }

    /// Require no modification after `since`
    pub fn if_unmodified_since(since: DateTime<Utc>) -> Self {
        Self {
            if_unmodified_since: Some(since),
            ..Self::default()
        }
    }

    /// True when no condition is set
    pub fn is_empty(&self) -> bool {
        self.if_match.is_none() && self.if_unmodified_since.is_none()
    }

    fn register(&self, txn: &mut Transaction<'_>, id: &DocId) {
        if let Some(hash) = &self.if_match {
            txn.if_match_hash(id.clone(), hash.clone());
        }
        if let Some(since) = self.if_unmodified_since {
            txn.if_unmodified_since(id.clone(), since);
        }
    }
}

/// A JSON document store rooted at one data directory
#[derive(Debug)]
pub struct Store {
    data_dir: PathBuf,
    config: StoreConfig,
    default_access: Access,
    documents: DocumentCache,
    metadata: MetadataCache,
}

impl Store {
    /// Open a store, creating the data directory and `jstore.toml` if needed
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        if !data_dir.exists() {
            info!(path = %data_dir.display(), "data directory does not exist, creating");
            fs::create_dir_all(data_dir)?;
        }
        let config_path = data_dir.join(CONFIG_FILE_NAME);
        StoreConfig::write_default_if_missing(&config_path)?;
        let config = StoreConfig::from_file(&config_path)?;
        Self::with_config(data_dir, config)
    }

    /// Open a store with an explicit config, ignoring any `jstore.toml`
    pub fn with_config(data_dir: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let default_access = config.access()?;
        fs::create_dir_all(&data_dir)?;

        let documents = DocumentCache::new(&data_dir, config.document_cache_bytes());
        let metadata = MetadataCache::new(&data_dir, config.metadata_cache_entries);
        info!(
            path = %data_dir.display(),
            document_cache_mb = config.document_cache_mb,
            metadata_cache_entries = config.metadata_cache_entries,
            default_access = %default_access,
            "store opened"
        );

        Ok(Self {
            data_dir,
            config,
            default_access,
            documents,
            metadata,
        })
    }

    /// Data directory of this store
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Active configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn access(&self, credential: Credential) -> MetadataAccess<'_> {
        MetadataAccess::new(&self.metadata, credential)
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Create a document holding `initial` (`null` when absent)
    ///
    /// Needs a credential unless new documents are public. The document
    /// gets the configured default access level.
    pub fn create(&self, initial: Option<Value>, credential: Credential) -> Result<DocId> {
        if self.default_access != Access::Public && !credential.is_authenticated() {
            return Err(Error::Unauthorized("create".to_string()));
        }

        let id = self.metadata.create()?;
        self.metadata.put(&Metadata::new(id.clone(), self.default_access))?;
        self.documents.put(&id, initial.unwrap_or(Value::Null))?;
        info!(id = %id, access = %self.default_access, "document created");
        Ok(id)
    }

    /// Read the node at `pointer` and the document's content hash
    pub fn get(&self, id: &DocId, pointer: &str, credential: Credential) -> Result<(Value, ContentHash)> {
        self.access(credential).check(id, AccessMode::Read)?;
        let (doc, hash) = self.documents.get(id)?;
        let node = json::get(&doc, pointer)?.clone();
        Ok((node, hash))
    }

    /// Write `value` at `pointer`
    ///
    /// An empty pointer replaces the whole document without reading it.
    /// Otherwise the node is replaced inside the current document and the
    /// hash seen before the write is returned.
    pub fn put(
        &self,
        id: &DocId,
        pointer: &str,
        value: Value,
        credential: Credential,
        precondition: &Precondition,
    ) -> Result<Option<ContentHash>> {
        self.access(credential).check(id, AccessMode::Write)?;

        let mut txn = Transaction::new(&self.documents);
        precondition.register(&mut txn, id);
        if pointer.is_empty() {
            txn.put(id.clone(), value);
            txn.commit()?;
            return Ok(None);
        }

        let current = txn.get(id)?;
        let updated = json::replace((*current).clone(), pointer, value)?;
        txn.put(id.clone(), updated);
        let prior = txn.observed_hash(id).cloned();
        txn.commit()?;
        debug!(id = %id, pointer, "node replaced");
        Ok(prior)
    }

    /// Apply a JSON Merge Patch to the node at `pointer`
    ///
    /// Returns the hash seen before the write.
    pub fn merge_patch(
        &self,
        id: &DocId,
        pointer: &str,
        patch: &Value,
        credential: Credential,
        precondition: &Precondition,
    ) -> Result<Option<ContentHash>> {
        let access = self.access(credential);
        let mut txn = Transaction::new(&self.documents);
        precondition.register(&mut txn, id);
        apply_merge(&mut txn, &access, id, pointer, patch)?;
        let prior = txn.observed_hash(id).cloned();
        txn.commit()?;
        debug!(id = %id, pointer, "merge patch applied");
        Ok(prior)
    }

    /// Apply a JSON Patch operation list
    ///
    /// `doc` and `base_pointer` are the request's own target; operations may
    /// name other documents by prefixing their path with an id. With no
    /// `doc`, every path must carry an id and `precondition` is not used.
    pub fn json_patch(
        &self,
        doc: Option<&DocId>,
        base_pointer: &str,
        ops: &Value,
        credential: Credential,
        precondition: &Precondition,
    ) -> Result<()> {
        let ops = parse_operations(ops, doc, base_pointer)?;
        let count = ops.len();

        let access = self.access(credential);
        let mut txn = Transaction::new(&self.documents);
        if let Some(id) = doc {
            precondition.register(&mut txn, id);
        }
        apply_operations(&mut txn, &access, ops)?;
        txn.commit()?;
        debug!(operations = count, "json patch applied");
        Ok(())
    }

    /// Apply a patch body of the given kind, probing when unknown
    pub fn patch(
        &self,
        doc: Option<&DocId>,
        base_pointer: &str,
        body: &Value,
        kind: Option<PatchKind>,
        credential: Credential,
        precondition: &Precondition,
    ) -> Result<()> {
        let kind = kind.unwrap_or_else(|| PatchKind::probe(doc.is_some(), body));
        match (kind, doc) {
            (PatchKind::JsonPatch, _) => {
                self.json_patch(doc, base_pointer, body, credential, precondition)
            }
            (PatchKind::MergePatch, Some(id)) => self
                .merge_patch(id, base_pointer, body, credential, precondition)
                .map(|_| ()),
            (PatchKind::MergePatch, None) => Err(Error::InvalidPatch(
                "merge patch needs a document id".to_string(),
            )),
        }
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Stored metadata for `id`, or `None` when unknown
    pub fn metadata(&self, id: &str) -> Result<Option<Metadata>> {
        self.metadata.get(id)
    }

    /// Change a document's access level
    ///
    /// Checked as a write against the current access level.
    pub fn set_access(&self, id: &DocId, access: Access, credential: Credential) -> Result<()> {
        let current = self
            .metadata
            .get(id.as_str())?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        authorize(id, current.access, credential, AccessMode::Write)?;
        self.metadata.put(&Metadata::new(id.clone(), access))?;
        info!(id = %id, from = %current.access, to = %access, "access changed");
        Ok(())
    }
}
