//! JSON Pointer engine
//!
//! Stateless navigation and mutation of JSON trees addressed by
//! RFC 6901 pointers:
//! - Pointer syntax: `/`-separated segments, `~0` → `~`, `~1` → `/`,
//!   empty pointer is the document root
//! - Read: [`get`], [`test`]
//! - Mutation: [`add`], [`remove`], [`replace`], [`move_within`],
//!   [`move_across`], [`copy_within`], [`copy_across`]
//! - RFC 7396 merge: [`merge`]
//!
//! # Ownership
//!
//! Every mutating operation takes the tree by value and returns the new root.
//! Callers that hold a shared tree (e.g. a cache-resident `Arc<Value>`) must
//! clone it first; `Value::clone` is a deep copy, so the result never aliases
//! the original. Cross-document operations take two trees and hand both back.
//!
//! # Array indices
//!
//! | Operation | Valid final index | Failure |
//! |-----------|-------------------|---------|
//! | get / remove / intermediate | `0..len` | `NotFound` |
//! | add | `0..=len` or `-` | `OutOfRange` |
//! | replace | `0..len` | `OutOfRange` |
//!
//! Index segments must be plain ASCII digits; anything else is
//! `InvalidPointer`.

use crate::error::{Error, Result};
use serde_json::Value;

// =============================================================================
// Pointer Syntax
// =============================================================================

/// Escape a single key for use as a pointer segment
///
/// ```
/// use jstore_core::json::escape_segment;
///
/// assert_eq!(escape_segment("a/b"), "a~1b");
/// assert_eq!(escape_segment("~x"), "~0x");
/// ```
pub fn escape_segment(segment: &str) -> String {
    if !segment.contains('/') && !segment.contains('~') {
        return segment.to_string();
    }
    segment.replace('~', "~0").replace('/', "~1")
}

/// Join unescaped keys into a pointer string
pub fn format_pointer<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(&escape_segment(segment.as_ref()));
    }
    out
}

/// Split a pointer into unescaped segments
///
/// ```
/// use jstore_core::json::parse_pointer;
///
/// assert!(parse_pointer("").unwrap().is_empty());
/// assert_eq!(parse_pointer("/a~1b/~0/0").unwrap(), vec!["a/b", "~", "0"]);
/// assert!(parse_pointer("a").is_err());
/// assert!(parse_pointer("/~2").is_err());
/// ```
pub fn parse_pointer(pointer: &str) -> Result<Vec<String>> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let rest = pointer
        .strip_prefix('/')
        .ok_or_else(|| Error::invalid_pointer(pointer, "expected '/' at position 0"))?;
    rest.split('/')
        .map(|raw| unescape_in(pointer, raw))
        .collect()
}

/// Undo [`escape_segment`]
///
/// Fails with `InvalidPointer` on a `~` not followed by `0` or `1`.
pub fn unescape_segment(segment: &str) -> Result<String> {
    unescape_in(segment, segment)
}

fn unescape_in(pointer: &str, raw: &str) -> Result<String> {
    if !raw.contains('~') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => {
                return Err(Error::invalid_pointer(
                    pointer,
                    "'~' should be encoded as '~0'",
                ))
            }
        }
    }
    Ok(out)
}

/// How an array index segment is about to be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexUse {
    /// Addressing an existing element
    Navigate,
    /// Inserting before an element, or appending
    Insert,
    /// Overwriting an existing element
    Overwrite,
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_index(segment: &str, len: usize, usage: IndexUse) -> Result<usize> {
    // `None` is a negative index: numeric, but never in range.
    let idx = if segment == "-" {
        Some(len)
    } else if is_digits(segment) {
        // Too many digits to fit usize is simply past the end.
        Some(segment.parse::<usize>().unwrap_or(usize::MAX))
    } else if segment.strip_prefix('-').map_or(false, is_digits) {
        None
    } else {
        return Err(Error::invalid_pointer(
            segment,
            format!("bad format index '{}'", segment),
        ));
    };

    let in_range = match (usage, idx) {
        (_, None) => false,
        (IndexUse::Insert, Some(idx)) => idx <= len,
        (_, Some(idx)) => idx < len,
    };
    match idx {
        Some(idx) if in_range => Ok(idx),
        _ if usage == IndexUse::Navigate => Err(Error::NotFound(format!(
            "index '{}' out of range '{}'",
            segment, len
        ))),
        _ => Err(Error::OutOfRange {
            index: segment.to_string(),
            len,
        }),
    }
}

// =============================================================================
// Navigation
// =============================================================================

fn child<'a>(node: &'a Value, segment: &str) -> Result<&'a Value> {
    match node {
        Value::Object(obj) => obj
            .get(segment)
            .ok_or_else(|| Error::NotFound(format!("no element with key {}", segment))),
        Value::Array(arr) => {
            let idx = parse_index(segment, arr.len(), IndexUse::Navigate)?;
            Ok(&arr[idx])
        }
        _ => Err(Error::TypeMismatch {
            segment: segment.to_string(),
        }),
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &str) -> Result<&'a mut Value> {
    match node {
        Value::Object(obj) => obj
            .get_mut(segment)
            .ok_or_else(|| Error::NotFound(format!("no element with key {}", segment))),
        Value::Array(arr) => {
            let idx = parse_index(segment, arr.len(), IndexUse::Navigate)?;
            Ok(&mut arr[idx])
        }
        _ => Err(Error::TypeMismatch {
            segment: segment.to_string(),
        }),
    }
}

fn navigate_mut<'a>(root: &'a mut Value, segments: &[String]) -> Result<&'a mut Value> {
    let mut current = root;
    for segment in segments {
        current = child_mut(current, segment)?;
    }
    Ok(current)
}

/// Get the node at `pointer`
///
/// ```
/// use jstore_core::json::get;
/// use serde_json::json;
///
/// let doc = json!({"loveFrom": [{"language": "Go"}, {"editor": "vscode"}]});
/// assert_eq!(get(&doc, "/loveFrom/1/editor").unwrap(), &json!("vscode"));
/// assert_eq!(get(&doc, "").unwrap(), &doc);
/// assert!(get(&doc, "/loveFrom/9").is_err());
/// ```
pub fn get<'a>(root: &'a Value, pointer: &str) -> Result<&'a Value> {
    let mut current = root;
    for segment in parse_pointer(pointer)? {
        current = child(current, &segment)?;
    }
    Ok(current)
}

// =============================================================================
// Mutation
// =============================================================================

fn place(parent: &mut Value, segment: &str, value: Value, usage: IndexUse) -> Result<()> {
    match parent {
        Value::Object(obj) => {
            obj.insert(segment.to_string(), value);
            Ok(())
        }
        Value::Array(arr) => {
            let idx = parse_index(segment, arr.len(), usage)?;
            if usage == IndexUse::Insert {
                arr.insert(idx, value);
            } else {
                arr[idx] = value;
            }
            Ok(())
        }
        _ => Err(Error::TypeMismatch {
            segment: segment.to_string(),
        }),
    }
}

fn put_at(mut root: Value, pointer: &str, value: Value, usage: IndexUse) -> Result<Value> {
    let segments = parse_pointer(pointer)?;
    let Some((last, parents)) = segments.split_last() else {
        return Ok(value);
    };
    let parent = navigate_mut(&mut root, parents)?;
    place(parent, last, value, usage)?;
    Ok(root)
}

/// Insert `value` at `pointer`
///
/// Object targets insert or overwrite the key. Array targets insert before
/// the given index, or append for `-` / `len`. Missing intermediate nodes
/// fail with `NotFound`; no paths are created implicitly.
pub fn add(root: Value, pointer: &str, value: Value) -> Result<Value> {
    put_at(root, pointer, value, IndexUse::Insert)
}

/// Replace the node at `pointer` with `value`
///
/// Same as [`add`] for objects. For arrays the final index must address an
/// existing element; `-` and `len` are rejected with `OutOfRange`.
pub fn replace(root: Value, pointer: &str, value: Value) -> Result<Value> {
    put_at(root, pointer, value, IndexUse::Overwrite)
}

/// Remove the node at `pointer`, returning `(new_root, removed)`
///
/// Removing the root leaves `null` behind.
pub fn take(mut root: Value, pointer: &str) -> Result<(Value, Value)> {
    let segments = parse_pointer(pointer)?;
    let Some((last, parents)) = segments.split_last() else {
        return Ok((Value::Null, root));
    };
    let parent = navigate_mut(&mut root, parents)?;
    let removed = match parent {
        Value::Object(obj) => obj
            .remove(last.as_str())
            .ok_or_else(|| Error::NotFound(format!("no element with key {}", last)))?,
        Value::Array(arr) => {
            let idx = parse_index(last, arr.len(), IndexUse::Navigate)?;
            arr.remove(idx)
        }
        _ => {
            return Err(Error::TypeMismatch {
                segment: last.clone(),
            })
        }
    };
    Ok((root, removed))
}

/// Remove the node at `pointer`
///
/// Array elements after the removed one shift down by one.
pub fn remove(root: Value, pointer: &str) -> Result<Value> {
    take(root, pointer).map(|(root, _)| root)
}

/// Move the node at `from` to `to` within one tree
pub fn move_within(root: Value, from: &str, to: &str) -> Result<Value> {
    let (root, moved) = take(root, from)?;
    add(root, to, moved)
}

/// Move the node at `from` in `src` to `to` in `dst`
///
/// Returns `(src, dst)` after the move.
pub fn move_across(src: Value, dst: Value, from: &str, to: &str) -> Result<(Value, Value)> {
    let (src, moved) = take(src, from)?;
    let dst = add(dst, to, moved)?;
    Ok((src, dst))
}

/// Copy the node at `from` to `to` within one tree
pub fn copy_within(root: Value, from: &str, to: &str) -> Result<Value> {
    let copied = get(&root, from)?.clone();
    add(root, to, copied)
}

/// Copy the node at `from` in `src` to `to` in `dst`
///
/// `src` is only borrowed and stays untouched.
pub fn copy_across(src: &Value, dst: Value, from: &str, to: &str) -> Result<Value> {
    let copied = get(src, from)?.clone();
    add(dst, to, copied)
}

/// Check that the node at `pointer` equals `expected`
///
/// Fails with `ValueMismatch` when the values differ and with the usual
/// navigation errors when the pointer does not resolve.
pub fn test(root: &Value, pointer: &str, expected: &Value) -> Result<()> {
    let actual = get(root, pointer)?;
    if json_equal(actual, expected) {
        Ok(())
    } else {
        Err(Error::ValueMismatch {
            pointer: pointer.to_string(),
        })
    }
}

/// Structural equality where numbers compare by value (`1 == 1.0`)
pub fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if x == y {
                return true;
            }
            if x.is_f64() || y.is_f64() {
                return matches!((x.as_f64(), y.as_f64()), (Some(p), Some(q)) if p == q);
            }
            false
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| json_equal(p, q))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).map_or(false, |w| json_equal(v, w)))
        }
        _ => a == b,
    }
}

// =============================================================================
// RFC 7396 JSON Merge Patch
// =============================================================================

/// Apply an RFC 7396 merge patch to `target`
///
/// - Object patch: each key merges recursively; a `null` value deletes the key
/// - Non-object target with an object patch starts from `{}`
/// - Non-object patch replaces the target entirely
///
/// ```
/// use jstore_core::json::merge;
/// use serde_json::json;
///
/// let merged = merge(json!({"c": 1, "d": 2}), &json!({"c": null}));
/// assert_eq!(merged, json!({"d": 2}));
/// ```
pub fn merge(mut target: Value, patch: &Value) -> Value {
    merge_inner(&mut target, patch);
    target
}

fn merge_inner(target: &mut Value, patch: &Value) {
    let Value::Object(patch_obj) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(target_obj) = target {
        for (key, value) in patch_obj {
            if value.is_null() {
                target_obj.remove(key);
            } else {
                // New keys still go through the merge so nested nulls are dropped.
                let slot = target_obj.entry(key.clone()).or_insert(Value::Null);
                merge_inner(slot, value);
            }
        }
    }
}
