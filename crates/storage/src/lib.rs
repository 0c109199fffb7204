//! Storage layer for jstore
//!
//! This crate implements the two caches sitting over the data directory:
//! - DocumentCache: byte-bounded LRU over `<id>/data.json`
//! - MetadataCache: count-bounded LRU over `<id>/meta.json`, plus id allocation
//! - layout: path helpers and the rename-into-place file writer
//!
//! # Locking
//!
//! Each cache owns one `parking_lot::Mutex` held for the whole of every
//! public call, file I/O included. Eviction is synchronous and only follows
//! a cache-miss load.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod layout;
pub mod metadata;

pub use document::{Document, DocumentCache, DocumentGuard, SerializedDocument};
pub use metadata::{MetadataCache, MAX_ALLOCATION_ATTEMPTS};
