//! Per-document access checks used by the patch orchestrator
//!
//! The orchestrator asks an [`AccessCheck`] before touching each document.
//! [`MetadataAccess`] answers from the metadata cache; tests and embedders
//! can pass a closure instead.

use jstore_core::{authorize, AccessMode, Credential, DocId, Error, Result};
use jstore_storage::MetadataCache;
use tracing::debug;

/// Decides whether an operation may read or write a document
pub trait AccessCheck {
    /// `Ok(())` to allow, otherwise the error to surface
    fn check(&self, id: &DocId, mode: AccessMode) -> Result<()>;
}

impl<F> AccessCheck for F
where
    F: Fn(&DocId, AccessMode) -> Result<()>,
{
    fn check(&self, id: &DocId, mode: AccessMode) -> Result<()> {
        self(id, mode)
    }
}

/// Access decisions from stored metadata and the caller's credential
///
/// Documents without metadata are reported as `NotFound`.
pub struct MetadataAccess<'a> {
    metadata: &'a MetadataCache,
    credential: Credential,
}

impl<'a> MetadataAccess<'a> {
    /// Check access against `metadata` on behalf of `credential`
    pub fn new(metadata: &'a MetadataCache, credential: Credential) -> Self {
        Self {
            metadata,
            credential,
        }
    }
}

impl AccessCheck for MetadataAccess<'_> {
    fn check(&self, id: &DocId, mode: AccessMode) -> Result<()> {
        let meta = self
            .metadata
            .get(id.as_str())?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        authorize(id, meta.access, self.credential, mode).map_err(|e| {
            debug!(id = %id, access = %meta.access, ?mode, "access denied");
            e
        })
    }
}
