//! DocumentCache: byte-bounded LRU cache over `data.json` files
//!
//! Maps document id → (value, content hash, last-modified, size). Owns all
//! file I/O for document bodies.
//!
//! # Design Notes
//!
//! - **Single coarse lock**: every public call holds one `parking_lot::Mutex`
//!   for its whole duration, file I/O included. [`DocumentCache::lock`]
//!   hands out that same lock as a guard so a transaction can check and
//!   write several documents without interleaving.
//! - **Shared immutable values**: cached bodies are `Arc<Value>`. Readers get
//!   a cheap handle; anything that wants to mutate clones first.
//! - **Soft capacity**: eviction runs only after a cache-miss load and trims
//!   least-recently-used entries other than the one just loaded, so a single
//!   oversized document still stays cached.

use std::fs::OpenOptions;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use tracing::debug;

use jstore_core::{ContentHash, DocId, Error, Result};

use crate::layout::{data_path, write_atomic};

/// A cached document body
#[derive(Debug, Clone)]
pub struct Document {
    /// Document id
    pub id: DocId,
    /// Parsed body
    pub value: Arc<Value>,
    /// Fingerprint of the exact bytes last read or written
    pub hash: ContentHash,
    /// File modification time on load, write time on store
    pub last_modified: DateTime<Utc>,
    /// Serialized size in bytes
    pub size: u64,
}

#[derive(Debug)]
struct CacheState {
    entries: LruCache<DocId, Document>,
    total_size: u64,
}

impl CacheState {
    fn insert(&mut self, doc: Document) {
        self.total_size += doc.size;
        if let Some(old) = self.entries.put(doc.id.clone(), doc) {
            self.total_size -= old.size;
        }
    }

    fn remove(&mut self, id: &DocId) {
        if let Some(old) = self.entries.pop(id) {
            self.total_size -= old.size;
        }
    }
}

/// Byte-bounded LRU cache of document bodies
#[derive(Debug)]
pub struct DocumentCache {
    data_dir: PathBuf,
    capacity: u64,
    state: Mutex<CacheState>,
}

impl DocumentCache {
    /// Create a cache over `data_dir` holding roughly `capacity` bytes
    pub fn new(data_dir: impl Into<PathBuf>, capacity: u64) -> Self {
        Self {
            data_dir: data_dir.into(),
            capacity,
            state: Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                total_size: 0,
            }),
        }
    }

    /// Read a document, loading it from disk on a miss
    ///
    /// A document directory without `data.json` yields `null` (an empty file
    /// is created). An unknown id yields `NotFound`.
    pub fn get(&self, id: &DocId) -> Result<(Arc<Value>, ContentHash)> {
        let doc = self.lock().load(id)?;
        Ok((doc.value, doc.hash))
    }

    /// Overwrite a document body
    ///
    /// Returns the fingerprint of the written bytes.
    pub fn put(&self, id: &DocId, value: Value) -> Result<ContentHash> {
        let doc = self.lock().store(id, value)?;
        Ok(doc.hash)
    }

    /// Acquire the cache lock for a multi-document sequence
    pub fn lock(&self) -> DocumentGuard<'_> {
        DocumentGuard {
            cache: self,
            state: self.state.lock(),
        }
    }

    /// Data directory this cache reads from
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Configured capacity in bytes
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of cached documents
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total serialized size of cached documents
    pub fn total_size(&self) -> u64 {
        self.state.lock().total_size
    }

    /// Whether `id` is cached (does not touch recency)
    pub fn contains(&self, id: &DocId) -> bool {
        self.state.lock().entries.contains(id)
    }
}

/// A document body together with its serialized bytes
///
/// Built only by serializing a value, so the bytes written to disk and the
/// value cached alongside them always agree.
#[derive(Debug)]
pub struct SerializedDocument {
    value: Value,
    bytes: Vec<u8>,
}

impl SerializedDocument {
    /// Serialize `value`
    pub fn new(value: Value) -> Result<Self> {
        let bytes = serde_json::to_vec(&value)?;
        Ok(Self { value, bytes })
    }

    /// The serialized bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Exclusive access to a [`DocumentCache`]
///
/// Holds the cache lock until dropped.
pub struct DocumentGuard<'a> {
    cache: &'a DocumentCache,
    state: MutexGuard<'a, CacheState>,
}

impl<'a> DocumentGuard<'a> {
    /// Cached document, or load from disk and evict
    pub fn load(&mut self, id: &DocId) -> Result<Document> {
        if let Some(doc) = self.state.entries.get(id) {
            return Ok(doc.clone());
        }

        let doc = read_document(&self.cache.data_dir, id)?;
        debug!(id = %id, size = doc.size, "document loaded");
        self.state.insert(doc.clone());
        self.evict();
        Ok(doc)
    }

    /// Serialize and write `value`, replacing any cached copy
    pub fn store(&mut self, id: &DocId, value: Value) -> Result<Document> {
        self.store_serialized(id, SerializedDocument::new(value)?)
    }

    /// Write a body serialized ahead of time
    pub fn store_serialized(&mut self, id: &DocId, body: SerializedDocument) -> Result<Document> {
        let SerializedDocument { value, bytes } = body;
        self.state.remove(id);
        write_atomic(&data_path(&self.cache.data_dir, id), &bytes)
            .map_err(|e| not_found_for(id, e))?;

        let doc = Document {
            id: id.clone(),
            value: Arc::new(value),
            hash: ContentHash::of(&bytes),
            last_modified: Utc::now(),
            size: bytes.len() as u64,
        };
        self.state.insert(doc.clone());
        Ok(doc)
    }

    fn evict(&mut self) {
        while self.state.total_size > self.cache.capacity && self.state.entries.len() > 1 {
            match self.state.entries.pop_lru() {
                Some((id, doc)) => {
                    self.state.total_size -= doc.size;
                    debug!(id = %id, size = doc.size, "document evicted");
                }
                None => break,
            }
        }
    }
}

fn read_document(data_dir: &Path, id: &DocId) -> Result<Document> {
    let path = data_path(data_dir, id);
    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(&path)
        .map_err(|e| not_found_for(id, e.into()))?;
    let modified = file.metadata()?.modified()?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };

    Ok(Document {
        id: id.clone(),
        value: Arc::new(value),
        hash: ContentHash::of(&bytes),
        last_modified: DateTime::<Utc>::from(modified),
        size: bytes.len() as u64,
    })
}

/// A missing document directory means the id is unknown
fn not_found_for(id: &DocId, err: Error) -> Error {
    match err {
        Error::Io(e) if e.kind() == io::ErrorKind::NotFound => Error::NotFound(id.to_string()),
        other => other,
    }
}
