//! Dotted path resolution over parsed JSON documents.
//!
//! A path expression is a string of `.`-separated segments, resolved strictly left to right
//! with each segment consuming one level of nesting:
//! - a literal key, matched against object keys
//! - a non-negative integer, matched against array positions
//! - the wildcard `*`, which requires an array and resolves the rest of the path against
//!   every element, collecting the results into a new array
//!
//! # Examples
//!
//! ```
//! use finder::path::resolve;
//! use serde_json::json;
//!
//! let doc = json!({ "list": [{ "x": 1 }, { "x": 2 }] });
//! assert_eq!(*resolve(&doc, "list.*.x", None)?, json!([1, 2]));
//! assert_eq!(*resolve(&doc, "list.1.x", None)?, json!(2));
//!
//! // A default only stands in for an absent key or index
//! let fallback = json!("n/a");
//! assert_eq!(*resolve(&doc, "list.7.x", Some(&fallback))?, json!("n/a"));
//! # Ok::<(), finder::errors::FinderError>(())
//! ```

use super::*;

/// The segment that broadcasts the remaining path over every element of an array.
pub const WILDCARD: &str = "*";

/// Resolves `path` against `value`.
///
/// Returns the addressed value, borrowed from `value` whenever possible. Only a wildcard
/// segment builds a new value.
///
/// # Arguments
///
/// * `value` - The document to resolve against. It is never modified.
/// * `path` - The dotted path expression. An empty path addresses `value` itself.
/// * `default` - Returned in place of a missing key or index, at any depth outside a wildcard
///   expansion.
///
/// # Errors
///
/// - [`FinderError::Lookup`] if a key or index is absent and no default was supplied
/// - [`FinderError::TypeKind`] if a segment is applied to a scalar, or the wildcard to a
///   non-array. A default never suppresses this.
pub fn resolve<'a>(
  value: &'a Value,
  path: &str,
  default: Option<&'a Value>,
) -> Result<Cow<'a, Value>, FinderError> {
  resolve_from(value, path, path, default)
}

/// Recursive step of [`resolve`], carrying the full expression for error reporting.
fn resolve_from<'a>(
  value: &'a Value,
  full: &str,
  path: &str,
  default: Option<&'a Value>,
) -> Result<Cow<'a, Value>, FinderError> {
  if path.is_empty() {
    return Ok(Cow::Borrowed(value));
  }

  let (head, rest) = path.split_once('.').unwrap_or((path, ""));

  if head == WILDCARD {
    let Value::Array(items) = value else {
      return Err(type_kind(full, value));
    };
    // Element failures propagate as-is: the default only covers the lookup that failed.
    let resolved = items
      .iter()
      .map(|item| resolve_from(item, full, rest, None).map(Cow::into_owned))
      .collect::<Result<Vec<_>, _>>()?;
    return Ok(Cow::Owned(Value::Array(resolved)));
  }

  let next = match value {
    Value::Array(items) => parse_index(head).and_then(|index| items.get(index)),
    Value::Object(map) => map.get(head),
    _ => return Err(type_kind(full, value)),
  };

  match (next, default) {
    (Some(next), _) => resolve_from(next, full, rest, default),
    (None, Some(default)) => Ok(Cow::Borrowed(default)),
    (None, None) => Err(FinderError::Lookup { path: full.to_string() }),
  }
}

/// Parses an array index segment. Only plain ASCII digits are accepted, so signs and
/// whitespace are treated as absent indices.
fn parse_index(segment: &str) -> Option<usize> {
  if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  segment.parse().ok()
}

/// Builds the structural mismatch error for `value`.
fn type_kind(full: &str, value: &Value) -> FinderError {
  FinderError::TypeKind { path: full.to_string(), found: kind_of(value) }
}

/// Names the kind of a JSON value for error messages.
pub fn kind_of(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn sample() -> Value {
    json!({
      "a": { "b": { "c": "deep" } },
      "list": [{ "x": 1 }, { "x": 2 }],
      "nested": [[1, 2], [3]],
      "scalar": "text",
      "0": "zero-key"
    })
  }

  #[test]
  fn test_empty_path_returns_input() {
    let doc = sample();
    assert_eq!(*resolve(&doc, "", None).unwrap(), doc);
  }

  #[test]
  fn test_nested_lookup_matches_manual_lookup() {
    let doc = sample();
    assert_eq!(*resolve(&doc, "a.b.c", None).unwrap(), doc["a"]["b"]["c"]);
    assert_eq!(*resolve(&doc, "a.b", None).unwrap(), json!({ "c": "deep" }));
  }

  #[test]
  fn test_lookup_borrows_without_wildcard() {
    let doc = sample();
    assert!(matches!(resolve(&doc, "a.b.c", None).unwrap(), Cow::Borrowed(_)));
    assert!(matches!(resolve(&doc, "list.*.x", None).unwrap(), Cow::Owned(_)));
  }

  #[test]
  fn test_missing_key_uses_default() {
    let doc = sample();
    let default = json!("D");
    assert_eq!(*resolve(&doc, "missing", Some(&default)).unwrap(), default);
    // The default covers absence at any depth
    assert_eq!(*resolve(&doc, "a.missing.c", Some(&default)).unwrap(), default);
  }

  #[test]
  fn test_missing_key_without_default() {
    let doc = sample();
    let err = resolve(&doc, "a.missing", None).unwrap_err();
    assert!(err.is_lookup());
    assert!(matches!(err, FinderError::Lookup { path } if path == "a.missing"));
  }

  #[test]
  fn test_index_segments() {
    let doc = sample();
    assert_eq!(*resolve(&doc, "list.0.x", None).unwrap(), json!(1));
    assert_eq!(*resolve(&doc, "nested.1.0", None).unwrap(), json!(3));
    // Numeric segments on objects are plain keys
    assert_eq!(*resolve(&doc, "0", None).unwrap(), json!("zero-key"));
  }

  #[test]
  fn test_bad_index_is_absence() {
    let doc = sample();
    let default = json!(null);
    for path in ["list.5.x", "list.-1", "list.+1", "list.first"] {
      assert!(resolve(&doc, path, None).unwrap_err().is_lookup(), "{path}");
      assert_eq!(*resolve(&doc, path, Some(&default)).unwrap(), default, "{path}");
    }
  }

  #[test]
  fn test_wildcard_broadcasts_in_order() {
    let doc = json!({ "list": [{ "x": 1 }, { "x": 2 }] });
    assert_eq!(*resolve(&doc, "list.*.x", None).unwrap(), json!([1, 2]));
    assert_eq!(*resolve(&doc, "list.*", None).unwrap(), json!([{ "x": 1 }, { "x": 2 }]));
  }

  #[test]
  fn test_nested_wildcards() {
    let doc = json!({ "rows": [{ "cells": [{ "v": "a" }, { "v": "b" }] }, { "cells": [] }] });
    assert_eq!(*resolve(&doc, "rows.*.cells.*.v", None).unwrap(), json!([["a", "b"], []]));
  }

  #[test]
  fn test_wildcard_element_errors_ignore_default() {
    let doc = json!({ "list": [{ "x": 1 }, { "y": 2 }] });
    let default = json!("D");
    let err = resolve(&doc, "list.*.x", Some(&default)).unwrap_err();
    assert!(err.is_lookup());
  }

  #[test]
  fn test_wildcard_requires_array() {
    let doc = sample();
    let default = json!("D");
    let err = resolve(&doc, "a.*.c", Some(&default)).unwrap_err();
    assert!(matches!(err, FinderError::TypeKind { found: "an object", .. }));
  }

  #[test]
  fn test_type_mismatch_never_defaulted() {
    let doc = json!({ "a": "scalar" });
    let default = json!("D");
    let err = resolve(&doc, "a.b", Some(&default)).unwrap_err();
    assert!(matches!(err, FinderError::TypeKind { ref path, found: "a string" } if path == "a.b"));
    assert!(err.is_config_error());

    let err = resolve(&json!({ "n": null }), "n.x", None).unwrap_err();
    assert!(matches!(err, FinderError::TypeKind { found: "null", .. }));
  }

  #[test]
  fn test_resolution_is_pure() {
    let doc = sample();
    let before = doc.clone();
    let first = resolve(&doc, "list.*.x", None).unwrap().into_owned();
    let second = resolve(&doc, "list.*.x", None).unwrap().into_owned();
    assert_eq!(first, second);
    assert_eq!(doc, before);
  }
}
