//! Boolean query documents used to post-filter extracted papers.
//!
//! A query document is a small boolean tree:
//! - `should`: sub-queries combined with OR, vacuously true when empty
//! - `must`: sub-queries combined with AND, vacuously true when empty
//! - `match`: at most one `field: pattern` pair, true when the pattern with every `*` removed
//!   occurs in the field's value
//!
//! When `match` is present its result is the result of the whole document, and any `must` or
//! `should` next to it only contributes errors. Configurations use one or the other at each
//! level, never both.
//!
//! # Examples
//!
//! ```
//! use finder::{paper::Paper, query::Query};
//!
//! let query: Query = serde_json::from_str(
//!   r#"{ "should": [{ "match": { "title": "select*" } }, { "match": { "title": "manipulat*" } }] }"#,
//! )?;
//! let paper = Paper { title: "we built a selection technique".into(), ..Default::default() };
//! assert!(query.matches(&paper)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use super::*;

/// The character removed from `match` patterns before the substring test.
const PATTERN_WILDCARD: char = '*';

/// A query document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
  /// Alternatives, at least one of which must hold
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub should:  Vec<Query>,
  /// Conditions which must all hold
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub must:    Vec<Query>,
  /// Field name to substring pattern; at most one entry
  #[serde(default, rename = "match", skip_serializing_if = "BTreeMap::is_empty")]
  pub matcher: BTreeMap<String, String>,
}

impl Query {
  /// Builds a leaf query matching `pattern` against `field`.
  pub fn matching(field: impl Into<String>, pattern: impl Into<String>) -> Self {
    Self { matcher: BTreeMap::from([(field.into(), pattern.into())]), ..Default::default() }
  }

  /// Evaluates the query against `paper`.
  ///
  /// Every `should` and `must` sub-query is evaluated before the `match` clause is looked at,
  /// so an error anywhere in the tree surfaces even when `match` decides the result.
  ///
  /// # Errors
  ///
  /// - [`FinderError::InvalidQuery`] if a `match` clause has more than one key
  /// - [`FinderError::MissingField`] if a `match` clause names a field papers do not have
  pub fn matches(&self, paper: &Paper) -> Result<bool, FinderError> {
    let should = self.should.iter().map(|q| q.matches(paper)).collect::<Result<Vec<_>, _>>()?;
    let should = should.is_empty() || should.into_iter().any(|hit| hit);

    let must = self.must.iter().map(|q| q.matches(paper)).collect::<Result<Vec<_>, _>>()?;
    let must = must.into_iter().all(|hit| hit);

    if self.matcher.len() > 1 {
      return Err(FinderError::InvalidQuery(self.matcher.len()));
    }
    if let Some((field, pattern)) = self.matcher.iter().next() {
      let value = paper.field(field).ok_or_else(|| FinderError::MissingField(field.clone()))?;
      let needle = pattern.replace(PATTERN_WILDCARD, "");
      return Ok(value.contains(&needle));
    }

    Ok(must && should)
  }

  /// Checks the whole tree for `match` clauses with more than one key.
  ///
  /// Used when a site configuration is loaded so that a malformed query stops the run before
  /// any request is made.
  pub fn validate(&self) -> Result<(), FinderError> {
    if self.matcher.len() > 1 {
      return Err(FinderError::InvalidQuery(self.matcher.len()));
    }
    self.should.iter().chain(&self.must).try_for_each(Query::validate)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn paper(title: &str) -> Paper { Paper { title: title.to_string(), ..Default::default() } }

  fn parse(query: &str) -> Query { serde_json::from_str(query).unwrap() }

  #[test]
  fn test_empty_query_is_vacuously_true() {
    assert!(Query::default().matches(&paper("anything")).unwrap());
    assert!(parse(r#"{ "must": [], "should": [] }"#).matches(&paper("")).unwrap());
  }

  #[test]
  fn test_match_strips_wildcards() {
    let query = parse(r#"{ "match": { "title": "select*" } }"#);
    assert!(query.matches(&paper("we built a selection technique")).unwrap());
    assert!(!query.matches(&paper("a manipulation technique")).unwrap());
  }

  #[test]
  fn test_match_is_case_sensitive_substring() {
    let query = Query::matching("title", "*VR*");
    assert!(query.matches(&paper("Pointing in VR headsets")).unwrap());
    assert!(!query.matches(&paper("pointing in vr headsets")).unwrap());
  }

  #[test]
  fn test_match_on_list_field() {
    let query = Query::matching("authors", "Bob");
    let paper =
      Paper { authors: vec!["Alice Smith".into(), "Bob Jones".into()], ..Default::default() };
    assert!(query.matches(&paper).unwrap());
  }

  #[test]
  fn test_should_and_must() {
    let query = parse(
      r#"{
        "must": [
          { "should": [{ "match": { "title": "select*" } }, { "match": { "title": "manipulat*" } }] },
          { "should": [{ "match": { "abstract": "virtual" } }, { "match": { "abstract": "VR" } }] }
        ]
      }"#,
    );
    let mut hit = paper("Object manipulation with two hands");
    hit.abstract_text = "A study in virtual environments".into();
    let mut miss = paper("Object manipulation with two hands");
    miss.abstract_text = "A study on tabletops".into();

    assert!(query.matches(&hit).unwrap());
    assert!(!query.matches(&miss).unwrap());
  }

  #[test]
  fn test_two_match_keys_is_invalid() {
    let query = parse(r#"{ "match": { "title": "a", "abstract": "b" } }"#);
    assert!(matches!(query.matches(&paper("a")), Err(FinderError::InvalidQuery(2))));
    assert!(matches!(query.validate(), Err(FinderError::InvalidQuery(2))));

    let nested = Query { must: vec![query], ..Default::default() };
    assert!(matches!(nested.validate(), Err(FinderError::InvalidQuery(2))));
    assert!(Query::matching("title", "a").validate().is_ok());
  }

  #[test]
  fn test_missing_field() {
    let query = Query::matching("venue", "CHI");
    assert!(matches!(query.matches(&paper("x")), Err(FinderError::MissingField(f)) if f == "venue"));

    // Papers without a PDF simply do not match
    let query = Query::matching("pdf_url", "*pdf*");
    assert!(!query.matches(&paper("x")).unwrap());
    let with_pdf = paper("x").with_urls("https://host/p/1".into(), Some("https://host/pdf/1".into()));
    assert!(query.matches(&with_pdf).unwrap());
  }

  #[test]
  fn test_match_wins_over_siblings() {
    // Known quirk kept for compatibility with existing configurations: `match` decides the
    // result and a failing `must` next to it is ignored.
    let query = Query {
      must: vec![Query::matching("title", "absent")],
      ..Query::matching("title", "present")
    };
    assert!(query.matches(&paper("present")).unwrap());

    let query = Query {
      should: vec![Query::matching("title", "present")],
      ..Query::matching("title", "absent")
    };
    assert!(!query.matches(&paper("present")).unwrap());
  }

  #[test]
  fn test_sibling_errors_still_surface() {
    let query =
      Query { must: vec![Query::matching("unknown", "x")], ..Query::matching("title", "present") };
    assert!(matches!(query.matches(&paper("present")), Err(FinderError::MissingField(_))));
  }

  #[test]
  fn test_evaluation_is_pure() {
    let query = Query::matching("title", "select*");
    let record = paper("selection");
    assert_eq!(query.matches(&record).unwrap(), query.matches(&record).unwrap());
    assert_eq!(record, paper("selection"));
  }
}
