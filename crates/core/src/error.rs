//! Error types for jstore
//!
//! This module defines the error taxonomy used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Pointer navigation and cache load/save failures propagate unchanged to
//! the immediate caller. Every variant maps to a distinct externally
//! observable status via [`Error::status_code`].

use crate::types::{ContentHash, DocId};
use chrono::{DateTime, Utc};
use std::io;
use thiserror::Error;

/// Result type alias for jstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reason a commit-time precondition did not hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// Content hash changed since it was observed
    HashMismatch {
        /// Hash recorded by the transaction
        expected: ContentHash,
        /// Hash of the current document
        actual: ContentHash,
    },

    /// Document was written after the asserted time
    ModifiedSince {
        /// Time asserted by the transaction
        since: DateTime<Utc>,
        /// Current last-modified time
        modified: DateTime<Utc>,
    },
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Conflict::HashMismatch { expected, actual } => {
                write!(f, "hash {} does not match {}", actual, expected)
            }
            Conflict::ModifiedSince { since, modified } => {
                write!(
                    f,
                    "modified at {} after {}",
                    modified.to_rfc3339(),
                    since.to_rfc3339()
                )
            }
        }
    }
}

/// Error types for jstore
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown document, or pointer addresses a non-existent key/index
    #[error("not found: {0}")]
    NotFound(String),

    /// Array index beyond bounds, or append where append is not allowed
    #[error("index '{index}' out of range '{len}'")]
    OutOfRange {
        /// Offending index segment
        index: String,
        /// Array length at that level
        len: usize,
    },

    /// Malformed pointer syntax or escape sequence
    #[error("invalid pointer '{pointer}': {reason}")]
    InvalidPointer {
        /// The pointer being parsed
        pointer: String,
        /// What was wrong with it
        reason: String,
    },

    /// Pointer navigates into a scalar
    #[error("type mismatch at '{segment}': node is not array or object")]
    TypeMismatch {
        /// Segment that could not be resolved
        segment: String,
    },

    /// `test` operation value disagreement
    #[error("test failed: value at '{pointer}' does not match")]
    ValueMismatch {
        /// Pointer that was tested
        pointer: String,
    },

    /// Hash or modification-time condition violated at commit
    #[error("precondition failed for {id}: {conflict}")]
    PreconditionFailed {
        /// Document whose precondition failed
        id: DocId,
        /// Which condition failed
        conflict: Conflict,
    },

    /// Write without a credential where one is required
    ///
    /// Holds the document id, or the operation when no document exists yet.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed metadata or identifier
    #[error("validation error: {0}")]
    Validation(String),

    /// Malformed patch operation list
    #[error("invalid patch: {0}")]
    InvalidPatch(String),

    /// Id generation collisions exceeded the retry budget
    #[error("failed to allocate document id after {0} attempts")]
    AllocationExhausted(usize),

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build an `InvalidPointer` error
    pub fn invalid_pointer(pointer: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidPointer {
            pointer: pointer.into(),
            reason: reason.into(),
        }
    }

    /// HTTP-style status for the external layer
    ///
    /// Private documents that the caller cannot see surface as `NotFound`
    /// (see [`crate::types::authorize`]), so 404 never distinguishes
    /// "missing" from "hidden".
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::Unauthorized(_) => 401,
            Error::PreconditionFailed { .. } | Error::ValueMismatch { .. } => 412,
            Error::InvalidPointer { .. } | Error::Validation(_) | Error::InvalidPatch(_) => 400,
            Error::OutOfRange { .. } | Error::TypeMismatch { .. } => 406,
            Error::AllocationExhausted(_)
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::Config(_) => 500,
        }
    }

    /// Stable name of the error kind
    ///
    /// Several kinds share a status code; the kind tells them apart.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::OutOfRange { .. } => "out_of_range",
            Error::InvalidPointer { .. } => "invalid_pointer",
            Error::TypeMismatch { .. } => "type_mismatch",
            Error::ValueMismatch { .. } => "value_mismatch",
            Error::PreconditionFailed { .. } => "precondition_failed",
            Error::Unauthorized(_) => "unauthorized",
            Error::Validation(_) => "validation",
            Error::InvalidPatch(_) => "invalid_patch",
            Error::AllocationExhausted(_) => "allocation_exhausted",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
            Error::Config(_) => "config",
        }
    }

    /// True for commit-time precondition failures
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Error::PreconditionFailed { .. })
    }

    /// True when the caller should see "not found"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
