//! Document engine for jstore
//!
//! This crate ties the lower layers together:
//! - Store: create, read, overwrite and patch documents
//! - Patch orchestration: JSON Patch op lists (multi-document) and merge patch
//! - Access checks against per-document metadata
//! - Configuration via `jstore.toml`
//!
//! The engine is the only component that knows about:
//! - Credentials and access levels
//! - Resolving patch paths to documents
//! - Caller-supplied preconditions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod config;
pub mod patch;
pub mod store;

pub use access::{AccessCheck, MetadataAccess};
pub use config::{StoreConfig, CONFIG_FILE_NAME};
pub use patch::{Operation, PatchKind, Target};
pub use store::{Precondition, Store};
