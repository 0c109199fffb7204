//! Core types and JSON Pointer engine for jstore
//!
//! This crate defines the foundational pieces used throughout the system:
//! - Error: error taxonomy and status mapping
//! - DocId, ContentHash, Metadata: document identity and fingerprints
//! - Access, AccessMode, Credential, authorize: access policy
//! - json: stateless JSON Pointer navigation/mutation and merge patch

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod json;
pub mod types;

pub use error::{Conflict, Error, Result};
pub use serde_json::Value;
pub use types::{
    authorize, is_valid_doc_id, Access, AccessMode, ContentHash, Credential, DocId, Metadata,
    DOC_ID_LEN,
};
