//! Optimistic multi-document transactions over a [`DocumentCache`]
//!
//! A transaction stages whole-document writes in memory and records what it
//! expects the documents to look like at commit time:
//! - every first read of a document records its content hash
//! - [`Transaction::if_match_hash`] and [`Transaction::if_unmodified_since`]
//!   assert state the caller learned elsewhere (an ETag, a timestamp)
//!
//! Observed and asserted hashes are kept apart and both must hold, so an
//! asserted hash can never mask a change that happened after a read.
//!
//! [`Transaction::commit`] takes the cache lock once, re-checks all
//! preconditions against current state, and only then writes. A failed
//! precondition writes nothing, including documents other than the one that
//! conflicted.
//!
//! Writes themselves are applied one file at a time. A crash part-way
//! through leaves some documents updated and others not; there is no log to
//! replay. All bodies are serialized before the first file is replaced to
//! keep that window small.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use jstore_core::{Conflict, ContentHash, DocId, Error, Result, Value};
use jstore_storage::{DocumentCache, SerializedDocument};

/// Staged writes plus commit-time preconditions
///
/// Single use: `commit` consumes the transaction. Dropping it without
/// committing discards every staged write.
pub struct Transaction<'a> {
    cache: &'a DocumentCache,
    writes: BTreeMap<DocId, Arc<Value>>,
    observed_hashes: BTreeMap<DocId, ContentHash>,
    asserted_hashes: BTreeMap<DocId, ContentHash>,
    mtime_preconditions: BTreeMap<DocId, DateTime<Utc>>,
}

impl<'a> Transaction<'a> {
    /// Begin a transaction against `cache`
    pub fn new(cache: &'a DocumentCache) -> Self {
        Self {
            cache,
            writes: BTreeMap::new(),
            observed_hashes: BTreeMap::new(),
            asserted_hashes: BTreeMap::new(),
            mtime_preconditions: BTreeMap::new(),
        }
    }

    /// Read a document, seeing this transaction's own staged writes
    ///
    /// The returned value is shared with the cache; clone it before mutating.
    /// The first read of a document that was not written here records its
    /// hash as a precondition. Later reads leave that record alone.
    pub fn get(&mut self, id: &DocId) -> Result<Arc<Value>> {
        if let Some(value) = self.writes.get(id) {
            return Ok(Arc::clone(value));
        }
        let (value, hash) = self.cache.get(id)?;
        self.observed_hashes.entry(id.clone()).or_insert(hash);
        Ok(value)
    }

    /// Hash recorded by the first read of `id`, if any
    pub fn observed_hash(&self, id: &DocId) -> Option<&ContentHash> {
        self.observed_hashes.get(id)
    }

    /// Stage a full-document write
    pub fn put(&mut self, id: DocId, value: Value) {
        self.writes.insert(id, Arc::new(value));
    }

    /// Require the document's hash to equal `hash` at commit
    ///
    /// Replaces an earlier assertion for the same id. Hashes observed by
    /// reads are still checked as well.
    pub fn if_match_hash(&mut self, id: DocId, hash: ContentHash) {
        self.asserted_hashes.insert(id, hash);
    }

    /// Require the document not to have been modified after `since`
    pub fn if_unmodified_since(&mut self, id: DocId, since: DateTime<Utc>) {
        self.mtime_preconditions.insert(id, since);
    }

    /// Ids with staged writes, in commit order
    pub fn pending_writes(&self) -> impl Iterator<Item = &DocId> {
        self.writes.keys()
    }

    /// True when nothing has been staged
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }

    /// Check every precondition, then apply every staged write
    ///
    /// Runs entirely under the cache lock. The first failing precondition
    /// aborts with `PreconditionFailed` before any file is written.
    pub fn commit(self) -> Result<()> {
        let Transaction {
            cache,
            writes,
            observed_hashes,
            asserted_hashes,
            mtime_preconditions,
        } = self;
        let mut guard = cache.lock();

        for (id, expected) in asserted_hashes.iter().chain(observed_hashes.iter()) {
            let current = guard.load(id)?;
            if current.hash != *expected {
                debug!(id = %id, expected = %expected, actual = %current.hash, "hash precondition failed");
                return Err(Error::PreconditionFailed {
                    id: id.clone(),
                    conflict: Conflict::HashMismatch {
                        expected: expected.clone(),
                        actual: current.hash,
                    },
                });
            }
        }

        for (id, since) in &mtime_preconditions {
            let current = guard.load(id)?;
            if current.last_modified > *since {
                debug!(id = %id, "modify time precondition failed");
                return Err(Error::PreconditionFailed {
                    id: id.clone(),
                    conflict: Conflict::ModifiedSince {
                        since: *since,
                        modified: current.last_modified,
                    },
                });
            }
        }

        let mut staged = Vec::with_capacity(writes.len());
        for (id, value) in writes {
            let value = Arc::try_unwrap(value).unwrap_or_else(|shared| (*shared).clone());
            staged.push((id, SerializedDocument::new(value)?));
        }

        let count = staged.len();
        for (id, body) in staged {
            guard.store_serialized(&id, body)?;
        }
        debug!(writes = count, "transaction committed");
        Ok(())
    }
}
