//! Patch orchestration
//!
//! Two request shapes update documents:
//! - a JSON Patch operation list, which may span several documents
//! - a JSON Merge Patch against one sub-node of one document
//!
//! # Operation lists
//!
//! A request is handled in stages:
//! 1. **Parse** the whole list and resolve every `path`/`from` to a
//!    document id plus intra-document pointer. Any malformed operation
//!    fails the request before a single document is read.
//! 2. **Stage** operations in order through a [`Transaction`]. Each one is
//!    access-checked before its pointer work runs. Values read from the cache
//!    are cloned before mutation.
//! 3. **Commit** the transaction. The first failure anywhere drops the
//!    transaction, so nothing from the batch is written.
//!
//! # Target resolution
//!
//! A path starting with `/` (or empty) is relative to the request document
//! and is appended to the request's base pointer. Any other path must start
//! with a document id, and the rest of it is the pointer inside that
//! document:
//!
//! ```text
//! "/a/b"                                      -> request doc, base + "/a/b"
//! "0b6a1c0e-3d1f-4c2a-9e7b-5f8d2a1b3c4d/a/b"  -> that doc, "/a/b"
//! ```

use std::sync::Arc;

use jstore_concurrency::Transaction;
use jstore_core::{is_valid_doc_id, json, AccessMode, DocId, Error, Result, Value, DOC_ID_LEN};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::access::AccessCheck;

// =============================================================================
// Patch kind
// =============================================================================

/// Which patch format a request body uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    /// JSON Patch operation list (`application/json-patch+json`)
    JsonPatch,
    /// JSON Merge Patch (`application/merge-patch+json`)
    MergePatch,
}

impl PatchKind {
    /// Kind named by a content type, if any
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type {
            "application/json-patch+json" => Some(PatchKind::JsonPatch),
            "application/merge-patch+json" => Some(PatchKind::MergePatch),
            _ => None,
        }
    }

    /// Guess the kind from the request when no content type says
    ///
    /// Requests without a target document, and array bodies, are operation
    /// lists. Anything else is a merge patch.
    pub fn probe(has_document: bool, body: &Value) -> Self {
        if !has_document || body.is_array() {
            PatchKind::JsonPatch
        } else {
            PatchKind::MergePatch
        }
    }
}

// =============================================================================
// Operations
// =============================================================================

/// A resolved pointer: which document, and where inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Document the pointer addresses
    pub id: DocId,
    /// Pointer inside that document
    pub pointer: String,
}

/// One parsed and resolved JSON Patch operation
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Insert `value` at `path`
    Add {
        /// Where to insert
        path: Target,
        /// Value to insert
        value: Value,
    },
    /// Remove the node at `path`
    Remove {
        /// Node to remove
        path: Target,
    },
    /// Overwrite the node at `path`
    Replace {
        /// Node to overwrite
        path: Target,
        /// Replacement value
        value: Value,
    },
    /// Move the node at `from` to `path`, possibly across documents
    Move {
        /// Source node
        from: Target,
        /// Destination
        path: Target,
    },
    /// Copy the node at `from` to `path`, possibly across documents
    Copy {
        /// Source node
        from: Target,
        /// Destination
        path: Target,
    },
    /// Require the node at `path` to equal `value`
    Test {
        /// Node to compare
        path: Target,
        /// Expected value
        value: Value,
    },
}

impl Operation {
    /// Wire name of the operation
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Add { .. } => "add",
            Operation::Remove { .. } => "remove",
            Operation::Replace { .. } => "replace",
            Operation::Move { .. } => "move",
            Operation::Copy { .. } => "copy",
            Operation::Test { .. } => "test",
        }
    }

    /// Document the operation writes to, or reads for `test`
    pub fn target(&self) -> &Target {
        match self {
            Operation::Add { path, .. }
            | Operation::Remove { path }
            | Operation::Replace { path, .. }
            | Operation::Move { path, .. }
            | Operation::Copy { path, .. }
            | Operation::Test { path, .. } => path,
        }
    }
}

#[derive(Deserialize)]
struct RawOperation {
    op: Option<String>,
    path: Option<String>,
    #[serde(default, deserialize_with = "present")]
    value: Option<Value>,
    from: Option<String>,
}

/// `Some` whenever the key is present, even for an explicit `null`
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Resolve a patch path against the request document and base pointer
pub fn resolve_target(doc: Option<&DocId>, base_pointer: &str, path: &str) -> Result<Target> {
    if !path.is_empty() && !path.starts_with('/') {
        let id = match path.get(..DOC_ID_LEN) {
            Some(prefix) if is_valid_doc_id(prefix) => DocId::parse(prefix)?,
            _ => {
                return Err(Error::InvalidPatch(format!(
                    "expected a document id at the start of '{}'",
                    path
                )))
            }
        };
        return Ok(Target {
            id,
            pointer: path[DOC_ID_LEN..].to_string(),
        });
    }

    match doc {
        Some(id) => Ok(Target {
            id: id.clone(),
            pointer: format!("{}{}", base_pointer, path),
        }),
        None => Err(Error::InvalidPatch(format!(
            "expected a document id in '{}'",
            path
        ))),
    }
}

/// Parse and resolve an operation list
///
/// Fails with `InvalidPatch` on a non-array body, a missing `op`/`path`,
/// a missing `value` (add, replace, test) or `from` (move, copy), or an
/// unsupported `op`.
pub fn parse_operations(body: &Value, doc: Option<&DocId>, base_pointer: &str) -> Result<Vec<Operation>> {
    if !body.is_array() {
        return Err(Error::InvalidPatch(
            "patch must be an array of operations".to_string(),
        ));
    }
    let raw = Vec::<RawOperation>::deserialize(body).map_err(|e| Error::InvalidPatch(e.to_string()))?;

    raw.into_iter()
        .enumerate()
        .map(|(index, raw)| parse_operation(index, raw, doc, base_pointer))
        .collect()
}

fn parse_operation(index: usize, raw: RawOperation, doc: Option<&DocId>, base: &str) -> Result<Operation> {
    let missing = |field: &str| Error::InvalidPatch(format!("operation {} has no '{}'", index, field));

    let op = raw.op.ok_or_else(|| missing("op"))?;
    let resolve = |path: &str| resolve_target(doc, base, path);

    let operation = match op.as_str() {
        "add" | "replace" | "test" => {
            let value = raw.value.ok_or_else(|| missing("value"))?;
            let path = resolve(&raw.path.ok_or_else(|| missing("path"))?)?;
            match op.as_str() {
                "add" => Operation::Add { path, value },
                "replace" => Operation::Replace { path, value },
                _ => Operation::Test { path, value },
            }
        }
        "remove" => Operation::Remove {
            path: resolve(&raw.path.ok_or_else(|| missing("path"))?)?,
        },
        "move" | "copy" => {
            let from = resolve(&raw.from.ok_or_else(|| missing("from"))?)?;
            let path = resolve(&raw.path.ok_or_else(|| missing("path"))?)?;
            if op == "move" {
                Operation::Move { from, path }
            } else {
                Operation::Copy { from, path }
            }
        }
        other => {
            return Err(Error::InvalidPatch(format!(
                "operation {} has unsupported op '{}'",
                index, other
            )))
        }
    };
    Ok(operation)
}

// =============================================================================
// Staging
// =============================================================================

fn owned(value: Arc<Value>) -> Value {
    Arc::try_unwrap(value).unwrap_or_else(|shared| (*shared).clone())
}

/// Stage every operation into `txn`, in order
///
/// Stops at the first failure. The caller decides whether to commit.
pub fn apply_operations<A>(txn: &mut Transaction<'_>, access: &A, ops: Vec<Operation>) -> Result<()>
where
    A: AccessCheck + ?Sized,
{
    for (index, op) in ops.into_iter().enumerate() {
        debug!(index, op = op.name(), id = %op.target().id, "staging patch operation");
        apply_operation(txn, access, op)?;
    }
    Ok(())
}

fn apply_operation<A>(txn: &mut Transaction<'_>, access: &A, op: Operation) -> Result<()>
where
    A: AccessCheck + ?Sized,
{
    match op {
        Operation::Add { path, value } => {
            access.check(&path.id, AccessMode::Write)?;
            let doc = owned(txn.get(&path.id)?);
            let doc = json::add(doc, &path.pointer, value)?;
            txn.put(path.id, doc);
        }
        Operation::Remove { path } => {
            access.check(&path.id, AccessMode::Write)?;
            let doc = owned(txn.get(&path.id)?);
            let doc = json::remove(doc, &path.pointer)?;
            txn.put(path.id, doc);
        }
        Operation::Replace { path, value } => {
            access.check(&path.id, AccessMode::Write)?;
            let doc = owned(txn.get(&path.id)?);
            let doc = json::replace(doc, &path.pointer, value)?;
            txn.put(path.id, doc);
        }
        Operation::Test { path, value } => {
            access.check(&path.id, AccessMode::Read)?;
            let doc = txn.get(&path.id)?;
            json::test(&doc, &path.pointer, &value)?;
        }
        Operation::Move { from, path } if from.id == path.id => {
            access.check(&path.id, AccessMode::Write)?;
            let doc = owned(txn.get(&path.id)?);
            let doc = json::move_within(doc, &from.pointer, &path.pointer)?;
            txn.put(path.id, doc);
        }
        Operation::Move { from, path } => {
            access.check(&from.id, AccessMode::Write)?;
            access.check(&path.id, AccessMode::Write)?;
            let src = owned(txn.get(&from.id)?);
            let dst = owned(txn.get(&path.id)?);
            let (src, dst) = json::move_across(src, dst, &from.pointer, &path.pointer)?;
            txn.put(from.id, src);
            txn.put(path.id, dst);
        }
        Operation::Copy { from, path } if from.id == path.id => {
            access.check(&path.id, AccessMode::Write)?;
            let doc = owned(txn.get(&path.id)?);
            let doc = json::copy_within(doc, &from.pointer, &path.pointer)?;
            txn.put(path.id, doc);
        }
        Operation::Copy { from, path } => {
            access.check(&from.id, AccessMode::Read)?;
            access.check(&path.id, AccessMode::Write)?;
            let src = txn.get(&from.id)?;
            let dst = owned(txn.get(&path.id)?);
            let dst = json::copy_across(&src, dst, &from.pointer, &path.pointer)?;
            txn.put(path.id, dst);
        }
    }
    Ok(())
}

/// Stage a merge patch of the node at `pointer` in document `id`
pub fn apply_merge<A>(txn: &mut Transaction<'_>, access: &A, id: &DocId, pointer: &str, patch: &Value) -> Result<()>
where
    A: AccessCheck + ?Sized,
{
    access.check(id, AccessMode::Write)?;
    let doc = owned(txn.get(id)?);
    let merged = json::merge(json::get(&doc, pointer)?.clone(), patch);
    let doc = json::replace(doc, pointer, merged)?;
    txn.put(id.clone(), doc);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc_id() -> DocId {
        DocId::parse("0b6a1c0e-3d1f-4c2a-9e7b-5f8d2a1b3c4d").unwrap()
    }

    #[test]
    fn test_probe() {
        assert_eq!(PatchKind::probe(false, &json!({"a": 1})), PatchKind::JsonPatch);
        assert_eq!(PatchKind::probe(true, &json!([])), PatchKind::JsonPatch);
        assert_eq!(PatchKind::probe(true, &json!({"a": 1})), PatchKind::MergePatch);
        assert_eq!(PatchKind::probe(true, &json!(null)), PatchKind::MergePatch);
    }

    #[test]
    fn test_from_content_type() {
        assert_eq!(
            PatchKind::from_content_type("application/merge-patch+json"),
            Some(PatchKind::MergePatch)
        );
        assert_eq!(
            PatchKind::from_content_type("application/json-patch+json"),
            Some(PatchKind::JsonPatch)
        );
        assert_eq!(PatchKind::from_content_type("application/json"), None);
    }

    #[test]
    fn test_resolve_relative_path() {
        let id = doc_id();
        let target = resolve_target(Some(&id), "/base", "/a/b").unwrap();
        assert_eq!(target.id, id);
        assert_eq!(target.pointer, "/base/a/b");

        let whole = resolve_target(Some(&id), "", "").unwrap();
        assert_eq!(whole.pointer, "");
    }

    #[test]
    fn test_resolve_id_prefixed_path() {
        let other = DocId::generate();
        let path = format!("{}/x/0", other);
        let target = resolve_target(Some(&doc_id()), "/ignored", &path).unwrap();
        assert_eq!(target.id, other);
        assert_eq!(target.pointer, "/x/0");

        let bare = resolve_target(None, "", other.as_str()).unwrap();
        assert_eq!(bare.pointer, "");
    }

    #[test]
    fn test_resolve_rejects_bad_prefix() {
        let err = resolve_target(Some(&doc_id()), "", "not-a-uuid/a").unwrap_err();
        assert!(matches!(err, Error::InvalidPatch(_)));
        assert!(resolve_target(Some(&doc_id()), "", "é").is_err());
    }

    #[test]
    fn test_resolve_requires_document() {
        assert!(matches!(
            resolve_target(None, "", "/a"),
            Err(Error::InvalidPatch(_))
        ));
    }

    #[test]
    fn test_parse_all_ops() {
        let id = doc_id();
        let body = json!([
            {"op": "add", "path": "/a", "value": 1},
            {"op": "remove", "path": "/a"},
            {"op": "replace", "path": "/b", "value": null},
            {"op": "move", "from": "/b", "path": "/c"},
            {"op": "copy", "from": "/c", "path": "/d"},
            {"op": "test", "path": "/d", "value": [1]},
        ]);
        let ops = parse_operations(&body, Some(&id), "").unwrap();
        let names: Vec<_> = ops.iter().map(Operation::name).collect();
        assert_eq!(names, ["add", "remove", "replace", "move", "copy", "test"]);
        assert_eq!(
            ops[2],
            Operation::Replace {
                path: Target {
                    id: id.clone(),
                    pointer: "/b".to_string()
                },
                value: Value::Null,
            }
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let id = doc_id();
        let cases = [
            json!({"op": "add", "path": "/a", "value": 1}),
            json!([{"path": "/a", "value": 1}]),
            json!([{"op": "add", "value": 1}]),
            json!([{"op": "add", "path": "/a"}]),
            json!([{"op": "test", "path": "/a"}]),
            json!([{"op": "move", "path": "/a"}]),
            json!([{"op": "copy", "path": "/a"}]),
            json!([{"op": "increment", "path": "/a"}]),
            json!([{"op": "add", "path": 7, "value": 1}]),
            json!([{"op": "remove", "path": "/a"}, "remove"]),
        ];
        for body in &cases {
            let err = parse_operations(body, Some(&id), "").unwrap_err();
            assert!(matches!(err, Error::InvalidPatch(_)), "{} -> {:?}", body, err);
        }
    }

    #[test]
    fn test_parse_fails_whole_batch() {
        let body = json!([
            {"op": "add", "path": "/a", "value": 1},
            {"op": "nope", "path": "/a"},
        ]);
        assert!(parse_operations(&body, Some(&doc_id()), "").is_err());
    }
}
