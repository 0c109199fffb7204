//! MetadataCache: count-bounded LRU cache over `meta.json` files
//!
//! Same locking and eviction shape as [`crate::DocumentCache`], bounded by
//! entry count instead of bytes. Also allocates document ids, since an id
//! exists exactly when its directory does.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use jstore_core::{is_valid_doc_id, Access, DocId, Error, Metadata, Result};

use crate::layout::{doc_dir, meta_path, write_atomic};

/// Attempts at finding an unused id before giving up
pub const MAX_ALLOCATION_ATTEMPTS: usize = 10;

/// Count-bounded LRU cache of document metadata
#[derive(Debug)]
pub struct MetadataCache {
    data_dir: PathBuf,
    capacity: usize,
    entries: Mutex<LruCache<DocId, Metadata>>,
}

impl MetadataCache {
    /// Create a cache over `data_dir` holding at most `capacity` entries
    /// after any load
    pub fn new(data_dir: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            data_dir: data_dir.into(),
            capacity,
            entries: Mutex::new(LruCache::unbounded()),
        }
    }

    /// Allocate a fresh document id and create its directory
    ///
    /// The directory is created with `create_dir`, so an id already on disk
    /// is detected and another one is drawn. Fails with
    /// `AllocationExhausted` after [`MAX_ALLOCATION_ATTEMPTS`] collisions.
    pub fn create(&self) -> Result<DocId> {
        self.create_with(DocId::generate)
    }

    /// `create` with the candidate ids drawn from `next_id`
    pub(crate) fn create_with(&self, mut next_id: impl FnMut() -> DocId) -> Result<DocId> {
        let _entries = self.entries.lock();
        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let id = next_id();
            match fs::create_dir(doc_dir(&self.data_dir, &id)) {
                Ok(()) => {
                    info!(id = %id, "document allocated");
                    return Ok(id);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    warn!(id = %id, "document id collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::AllocationExhausted(MAX_ALLOCATION_ATTEMPTS))
    }

    /// Metadata for `id`, or `None` when the id is unknown
    ///
    /// Unknown covers a malformed id, a missing directory, and a missing or
    /// empty `meta.json`. An unrecognised access level reads as private.
    pub fn get(&self, id: &str) -> Result<Option<Metadata>> {
        if !is_valid_doc_id(id) {
            return Ok(None);
        }
        let id = DocId::parse(id)?;

        let mut entries = self.entries.lock();
        if let Some(meta) = entries.get(&id) {
            return Ok(Some(meta.clone()));
        }

        let meta = match read_metadata(&self.data_dir, &id)? {
            Some(meta) => meta,
            None => return Ok(None),
        };
        entries.put(id, meta.clone());
        while entries.len() > self.capacity {
            match entries.pop_lru() {
                Some((evicted, _)) => debug!(id = %evicted, "metadata evicted"),
                None => break,
            }
        }
        Ok(Some(meta))
    }

    /// Write metadata to disk and cache it
    pub fn put(&self, meta: &Metadata) -> Result<()> {
        let bytes = serde_json::to_vec(meta)?;

        let mut entries = self.entries.lock();
        entries.pop(&meta.id);
        write_atomic(&meta_path(&self.data_dir, &meta.id), &bytes).map_err(|e| match e {
            Error::Io(err) if err.kind() == io::ErrorKind::NotFound => Error::NotFound(meta.id.to_string()),
            other => other,
        })?;
        entries.put(meta.id.clone(), meta.clone());
        Ok(())
    }

    /// Configured entry capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` is cached (does not touch recency)
    pub fn contains(&self, id: &DocId) -> bool {
        self.entries.lock().contains(id)
    }
}

fn read_metadata(data_dir: &Path, id: &DocId) -> Result<Option<Metadata>> {
    let bytes = match fs::read(meta_path(data_dir, id)) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if bytes.is_empty() {
        return Ok(None);
    }

    let raw: Value = serde_json::from_slice(&bytes)?;
    let access = match raw.get("access").and_then(Value::as_str) {
        Some(s) => s.parse().unwrap_or_else(|_| {
            warn!(id = %id, access = s, "unrecognised access level, treating as private");
            Access::Private
        }),
        None => {
            warn!(id = %id, "metadata without access level, treating as private");
            Access::Private
        }
    };
    Ok(Some(Metadata::new(id.clone(), access)))
}
