//! Core types for jstore
//!
//! This module defines the identifiers and access-control vocabulary shared
//! by every layer:
//! - DocId: validated document identifier (canonical UUID v4)
//! - ContentHash: truncated SHA-256 fingerprint of serialized document bytes
//! - Access / AccessMode / Credential: inputs to the access policy
//! - Metadata: per-document `{id, access}` record persisted as `meta.json`

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Length of a document id in its canonical textual form
pub const DOC_ID_LEN: usize = 36;

/// Check whether `s` is a canonical lowercase UUID v4
///
/// Accepted shape: `xxxxxxxx-xxxx-4xxx-Yxxx-xxxxxxxxxxxx` where `x` is a
/// lowercase hex digit and `Y` is one of `8`, `9`, `a`, `b`.
pub fn is_valid_doc_id(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != DOC_ID_LEN {
        return false;
    }
    for (i, &b) in bytes.iter().enumerate() {
        let ok = match i {
            8 | 13 | 18 | 23 => b == b'-',
            14 => b == b'4',
            19 => matches!(b, b'8' | b'9' | b'a' | b'b'),
            _ => b.is_ascii_digit() || (b'a'..=b'f').contains(&b),
        };
        if !ok {
            return false;
        }
    }
    true
}

/// Unique identifier for a stored document
///
/// Always holds a string that passes [`is_valid_doc_id`], so it is safe to
/// use as a directory name under the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocId(String);

impl DocId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        DocId(Uuid::new_v4().hyphenated().to_string())
    }

    /// Parse and validate an id
    pub fn parse(s: &str) -> Result<Self> {
        if is_valid_doc_id(s) {
            Ok(DocId(s.to_string()))
        } else {
            Err(Error::Validation(format!("id '{}' is invalid", s)))
        }
    }

    /// Borrow the textual form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DocId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DocId::parse(s)
    }
}

impl TryFrom<String> for DocId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        if is_valid_doc_id(&s) {
            Ok(DocId(s))
        } else {
            Err(Error::Validation(format!("id '{}' is invalid", s)))
        }
    }
}

impl From<DocId> for String {
    fn from(id: DocId) -> Self {
        id.0
    }
}

impl AsRef<str> for DocId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content fingerprint of a serialized document
///
/// First 8 bytes of the SHA-256 digest, as 16 lowercase hex characters.
/// Used only for optimistic-concurrency comparison and as an ETag-style
/// token for the external layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Fingerprint the exact bytes given
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut hex = String::with_capacity(16);
        for b in &digest[..8] {
            hex.push_str(&format!("{:02x}", b));
        }
        ContentHash(hex)
    }

    /// Wrap an opaque token received from the external layer
    pub fn from_token(token: impl Into<String>) -> Self {
        ContentHash(token.into())
    }

    /// Borrow the hex form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access level of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    /// Everyone can read and write
    Public,
    /// Everyone can read, writes need a credential
    Protected,
    /// Reads and writes need a credential
    Private,
}

impl Access {
    /// Wire name (`"public"`, `"protected"`, `"private"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Public => "public",
            Access::Protected => "protected",
            Access::Private => "private",
        }
    }
}

impl FromStr for Access {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "public" => Ok(Access::Public),
            "protected" => Ok(Access::Protected),
            "private" => Ok(Access::Private),
            other => Err(Error::Validation(format!("access '{}' is invalid", other))),
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an operation reads or mutates a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read-only access
    Read,
    /// Mutating access
    Write,
}

/// Whether the caller presented a valid credential
///
/// Verification happens outside the store; the engine only sees the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    /// No credential, or an invalid one
    Anonymous,
    /// A verified credential
    Authenticated,
}

impl Credential {
    /// True for [`Credential::Authenticated`]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Credential::Authenticated)
    }
}

impl From<bool> for Credential {
    fn from(authenticated: bool) -> Self {
        if authenticated {
            Credential::Authenticated
        } else {
            Credential::Anonymous
        }
    }
}

/// Access decision for one document
///
/// - Private: credential required for read and write; denial is reported
///   as `NotFound` so a hidden document looks exactly like a missing one.
/// - Protected: credential required for write only (`Unauthorized`).
/// - Public: always allowed.
pub fn authorize(id: &DocId, access: Access, credential: Credential, mode: AccessMode) -> Result<()> {
    if credential.is_authenticated() {
        return Ok(());
    }
    match (access, mode) {
        (Access::Private, _) => Err(Error::NotFound(id.to_string())),
        (Access::Protected, AccessMode::Write) => Err(Error::Unauthorized(id.to_string())),
        _ => Ok(()),
    }
}

/// Per-document metadata, persisted as `{"id": ..., "access": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Document id
    pub id: DocId,
    /// Access level
    pub access: Access,
}

impl Metadata {
    /// Create a metadata record
    pub fn new(id: DocId, access: Access) -> Self {
        Metadata { id, access }
    }
}
