//! Concurrency layer for jstore
//!
//! This crate implements optimistic multi-document transactions with:
//! - Transaction: staged writes with read-your-writes
//! - Hash preconditions recorded on first read or asserted explicitly
//! - Modify-time preconditions
//! - All-or-nothing precondition checking under the document cache lock
//!
//! Concurrent transactions touching the same document follow
//! last-commit-wins, gated by whatever preconditions each one asserted.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod transaction;

pub use transaction::Transaction;
