//! Field extraction from fetched documents.
//!
//! Every field of a site configuration is compiled once into a [`FieldRule`] whose
//! [`ExtractionMode`] decides how the field is pulled out of a [`Document`]:
//! - [`ExtractionMode::Json`] resolves a dotted path (see [`crate::path`]) against parsed JSON
//! - [`ExtractionMode::Regex`] runs a regular expression against raw markup
//! - [`ExtractionMode::Unset`] yields the rule's default
//!
//! Text results are normalized the same way regardless of the publisher: markup tags are
//! stripped, newlines collapse to spaces and surrounding whitespace is trimmed.
//!
//! # Examples
//!
//! ```
//! use finder::extract::{Document, FieldRule, FieldValue};
//!
//! let rule = FieldRule::regex(r"<h1>(.*?)</h1>", false)?;
//! let doc = Document::Text("<h1> <b>Jane</b> Doe </h1>".to_string());
//! assert_eq!(rule.extract(&doc)?, FieldValue::Text("Jane Doe".to_string()));
//! # Ok::<(), finder::errors::FinderError>(())
//! ```

use lazy_static::lazy_static;

use super::*;

lazy_static! {
  /// Matches a single markup tag.
  static ref MARKUP_TAG: Regex = Regex::new(r"<[^<]+?>").unwrap();
}

/// A fetched listing or paper body, either as raw text or as parsed JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
  /// Raw markup (or any other text) as returned by the server
  Text(String),
  /// A parsed JSON payload
  Json(Value),
}

impl Document {
  /// Wraps a response body, parsing it as JSON when `expect_json` is set.
  pub fn from_body(body: String, expect_json: bool) -> Result<Self, FinderError> {
    if expect_json {
      Ok(Document::Json(serde_json::from_str(&body)?))
    } else {
      Ok(Document::Text(body))
    }
  }

  /// Names the kind of document for error messages.
  fn kind(&self) -> &'static str {
    match self {
      Document::Text(_) => "raw text",
      Document::Json(_) => "parsed JSON",
    }
  }
}

/// The value extracted for a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
  /// A single string, used by scalar fields such as the title
  Text(String),
  /// An ordered sequence of strings, used by multi-valued fields such as the authors
  List(Vec<String>),
}

impl FieldValue {
  /// Collapses the value into a single string, joining lists with `", "`.
  pub fn into_text(self) -> String {
    match self {
      FieldValue::Text(text) => text,
      FieldValue::List(items) => items.join(", "),
    }
  }

  /// Expands the value into a list. An empty string becomes an empty list.
  pub fn into_list(self) -> Vec<String> {
    match self {
      FieldValue::Text(text) if text.is_empty() => Vec::new(),
      FieldValue::Text(text) => vec![text],
      FieldValue::List(items) => items,
    }
  }
}

/// How a field is located in a document.
#[derive(Debug, Clone)]
pub enum ExtractionMode {
  /// Resolve a dotted path against a JSON document
  Json(String),
  /// Match a regular expression against a text document
  Regex(Regex),
  /// Nothing configured; the field always takes its default
  Unset,
}

/// A compiled extraction rule for one field.
#[derive(Debug, Clone)]
pub struct FieldRule {
  /// Where the value comes from
  pub mode:    ExtractionMode,
  /// Whether the field collects every match instead of only the first
  pub multi:   bool,
  /// Value used when the field is unset or its JSON path is absent. Without one an absent
  /// path is a [`FinderError::Lookup`].
  pub default: Option<Value>,
}

impl FieldRule {
  /// Creates a rule with the standard default: `""` for scalar fields, `[]` for multi-valued
  /// ones.
  pub fn new(mode: ExtractionMode, multi: bool) -> Self {
    Self { mode, multi, default: Some(empty_value(multi)) }
  }

  /// Creates a JSON path rule. An empty path leaves the field unset.
  pub fn json(path: &str, multi: bool) -> Self {
    let mode =
      if path.is_empty() { ExtractionMode::Unset } else { ExtractionMode::Json(path.to_string()) };
    Self::new(mode, multi)
  }

  /// Creates a regular expression rule. An empty pattern leaves the field unset.
  ///
  /// # Errors
  ///
  /// Returns [`FinderError::Regex`] if the pattern does not compile.
  pub fn regex(pattern: &str, multi: bool) -> Result<Self, FinderError> {
    let mode = if pattern.is_empty() {
      ExtractionMode::Unset
    } else {
      ExtractionMode::Regex(Regex::new(pattern)?)
    };
    Ok(Self::new(mode, multi))
  }

  /// Replaces the rule's default value.
  pub fn with_default(mut self, default: Value) -> Self {
    self.default = Some(default);
    self
  }

  /// Drops the rule's default, so that a JSON path missing from the document is an error.
  pub fn required(mut self) -> Self {
    self.default = None;
    self
  }

  /// Extracts the field from `document`.
  ///
  /// # Errors
  ///
  /// Returns [`FinderError::TypeKind`] if the rule's mode does not fit the document kind, or
  /// the configured path does not fit the document's shape. Absent paths fall back to the
  /// rule's default, or fail with [`FinderError::Lookup`] when the rule is required.
  pub fn extract(&self, document: &Document) -> Result<FieldValue, FinderError> {
    match (&self.mode, document) {
      (ExtractionMode::Unset, _) => {
        let default = self.default.clone().unwrap_or_else(|| empty_value(self.multi));
        Ok(value_to_field(&default, self.multi))
      },
      (ExtractionMode::Json(path), Document::Json(value)) => {
        let resolved = crate::path::resolve(value, path, self.default.as_ref())?;
        Ok(value_to_field(&resolved, self.multi))
      },
      (ExtractionMode::Regex(pattern), Document::Text(text)) =>
        if self.multi {
          Ok(FieldValue::List(find_all(pattern, text)))
        } else {
          Ok(FieldValue::Text(find_first(pattern, text)))
        },
      (ExtractionMode::Json(path), doc) =>
        Err(FinderError::TypeKind { path: path.clone(), found: doc.kind() }),
      (ExtractionMode::Regex(pattern), doc) =>
        Err(FinderError::TypeKind { path: pattern.as_str().to_string(), found: doc.kind() }),
    }
  }
}

/// The standard default: `[]` for multi-valued fields, `""` otherwise.
fn empty_value(multi: bool) -> Value {
  if multi {
    Value::Array(Vec::new())
  } else {
    Value::String(String::new())
  }
}

/// Collects every match of `pattern` in `text`, normalized and deduplicated in first-seen
/// order.
///
/// Each match contributes the whole match, or its first capture group when the pattern has
/// groups.
pub fn find_all(pattern: &Regex, text: &str) -> Vec<String> {
  let mut seen = std::collections::HashSet::new();
  pattern
    .captures_iter(text)
    .map(|captures| normalize(capture_text(pattern, &captures)))
    .filter(|item| seen.insert(item.clone()))
    .collect()
}

/// Returns the first match of `pattern` in `text`, normalized, or `""` without a match.
pub fn find_first(pattern: &Regex, text: &str) -> String {
  pattern
    .captures(text)
    .map(|captures| normalize(capture_text(pattern, &captures)))
    .unwrap_or_default()
}

/// Picks the text a match contributes: the first group when the pattern has groups, the
/// whole match otherwise.
fn capture_text<'t>(pattern: &Regex, captures: &regex::Captures<'t>) -> &'t str {
  let group = if pattern.captures_len() > 1 { 1 } else { 0 };
  captures.get(group).map(|m| m.as_str()).unwrap_or_default()
}

/// Removes every markup tag from `text`.
pub fn strip_markup(text: &str) -> Cow<'_, str> { MARKUP_TAG.replace_all(text, "") }

/// Strips markup, turns newlines into spaces and trims the result.
pub fn normalize(text: &str) -> String { strip_markup(text).replace('\n', " ").trim().to_string() }

/// Title-cases `text`: the first letter of every run of letters is upper-cased and the rest
/// of the run lower-cased, so `"o'neil-SMITH"` becomes `"O'Neil-Smith"`.
pub fn title_case(text: &str) -> String {
  let mut result = String::with_capacity(text.len());
  let mut in_word = false;
  for c in text.chars() {
    if c.is_alphabetic() {
      if in_word {
        result.extend(c.to_lowercase());
      } else {
        result.extend(c.to_uppercase());
      }
      in_word = true;
    } else {
      result.push(c);
      in_word = false;
    }
  }
  result
}

/// Renders a scalar JSON value as a field string. `null` becomes empty; composites are
/// rendered as compact JSON.
pub fn value_to_string(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    composite => composite.to_string(),
  }
}

/// Converts a resolved JSON value into a field value.
///
/// Multi-valued fields flatten one level of nested arrays, which is what a wildcard path
/// over nested lists produces. Scalar fields join arrays with `", "`.
fn value_to_field(value: &Value, multi: bool) -> FieldValue {
  match (value, multi) {
    (Value::Array(items), true) => FieldValue::List(
      items
        .iter()
        .flat_map(|item| match item {
          Value::Array(inner) => inner.iter().map(value_to_string).collect::<Vec<_>>(),
          other => vec![value_to_string(other)],
        })
        .collect(),
    ),
    (Value::Array(items), false) =>
      FieldValue::Text(items.iter().map(value_to_string).collect::<Vec<_>>().join(", ")),
    (scalar, true) => FieldValue::List(FieldValue::Text(value_to_string(scalar)).into_list()),
    (scalar, false) => FieldValue::Text(value_to_string(scalar)),
  }
}

/// A one-time transform applied to a raw document before any field is extracted.
#[derive(Debug, Clone)]
pub enum Preprocessing {
  /// Pull a JSON blob embedded in the markup (for example inside a `<script>` tag) out with
  /// the first match of a regex, and parse it
  EmbeddedJson(Regex),
}

impl Preprocessing {
  /// Applies the transform.
  ///
  /// Must run once per document: an embedded JSON step turns text into JSON, and running it
  /// again on the result is a [`FinderError::TypeKind`] error.
  pub fn apply(&self, document: Document) -> Result<Document, FinderError> {
    match (self, document) {
      (Preprocessing::EmbeddedJson(pattern), Document::Text(text)) => {
        let raw = find_first(pattern, &text);
        trace!("Embedded JSON blob: {raw}");
        Ok(Document::Json(serde_json::from_str(&raw)?))
      },
      (Preprocessing::EmbeddedJson(pattern), doc) =>
        Err(FinderError::TypeKind { path: pattern.as_str().to_string(), found: doc.kind() }),
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn text(s: &str) -> Document { Document::Text(s.to_string()) }

  #[test]
  fn test_scalar_regex_strips_markup() {
    let rule = FieldRule::regex(r"<span class=.name.>(.*?)</span>", false).unwrap();
    let doc = text(r#"<span class="name"><b>Jane Doe</b> </span>"#);
    assert_eq!(rule.extract(&doc).unwrap(), FieldValue::Text("Jane Doe".into()));
  }

  #[test]
  fn test_scalar_regex_takes_first_match_and_group() {
    let rule = FieldRule::regex(r"<li>(\w+)-(\d+)</li>", false).unwrap();
    let doc = text("<li>alpha-1</li><li>beta-2</li>");
    assert_eq!(rule.extract(&doc).unwrap(), FieldValue::Text("alpha".into()));
  }

  #[test]
  fn test_scalar_regex_without_groups_uses_whole_match() {
    let rule = FieldRule::regex(r"10\.\d{4}/[\w.]+", false).unwrap();
    let doc = text("doi: 10.1145/3313831.3376303 end");
    assert_eq!(rule.extract(&doc).unwrap(), FieldValue::Text("10.1145/3313831.3376303".into()));
  }

  #[test]
  fn test_scalar_regex_no_match_is_empty() {
    let rule = FieldRule::regex(r"<h1>(.*)</h1>", false).unwrap();
    assert_eq!(rule.extract(&text("<h2>nothing</h2>")).unwrap(), FieldValue::Text(String::new()));
  }

  #[test]
  fn test_multi_regex_dedupes_in_order() {
    let rule = FieldRule::regex(r#"<a class="author">(.*?)</a>"#, true).unwrap();
    let doc = text(
      r#"<a class="author">Alice</a><a class="author">Bob</a><a class="author"><i>Alice</i></a>"#,
    );
    assert_eq!(rule.extract(&doc).unwrap(), FieldValue::List(vec!["Alice".into(), "Bob".into()]));
  }

  #[test]
  fn test_multi_regex_collapses_newlines() {
    let rule = FieldRule::regex(r"(?s)<kw>(.*?)</kw>", true).unwrap();
    let doc = text("<kw>\n virtual\nreality </kw><kw>selection</kw>");
    assert_eq!(
      rule.extract(&doc).unwrap(),
      FieldValue::List(vec!["virtual reality".into(), "selection".into()])
    );
  }

  #[test]
  fn test_non_participating_group_is_empty() {
    let rule = FieldRule::regex(r"a(x)?", true).unwrap();
    assert_eq!(rule.extract(&text("a ax")).unwrap(), FieldValue::List(vec!["".into(), "x".into()]));
  }

  #[test]
  fn test_empty_pattern_is_unset() {
    let scalar = FieldRule::regex("", false).unwrap();
    let multi = FieldRule::regex("", true).unwrap();
    assert!(matches!(scalar.mode, ExtractionMode::Unset));
    assert_eq!(scalar.extract(&text("anything")).unwrap(), FieldValue::Text(String::new()));
    assert_eq!(multi.extract(&text("anything")).unwrap(), FieldValue::List(Vec::new()));
  }

  #[test]
  fn test_invalid_pattern() {
    assert!(matches!(FieldRule::regex("(unclosed", false), Err(FinderError::Regex(_))));
  }

  #[test]
  fn test_json_scalar_and_default() {
    let doc = Document::Json(json!({ "title": "A Paper", "stats": { "citations": 12 } }));
    let title = FieldRule::json("title", false);
    let citations = FieldRule::json("stats.citations", false);
    let isbn = FieldRule::json("meta.isbn", false);
    assert_eq!(title.extract(&doc).unwrap(), FieldValue::Text("A Paper".into()));
    assert_eq!(citations.extract(&doc).unwrap(), FieldValue::Text("12".into()));
    assert_eq!(isbn.extract(&doc).unwrap(), FieldValue::Text(String::new()));
  }

  #[test]
  fn test_json_multi_flattens_wildcards() {
    let doc = Document::Json(json!({
      "authors": [{ "names": ["ann lee", "bo li"] }, { "names": ["cy wu"] }],
      "keywords": ["vr", "selection"]
    }));
    let authors = FieldRule::json("authors.*.names", true);
    let keywords = FieldRule::json("keywords", true);
    let missing = FieldRule::json("tags", true);
    assert_eq!(
      authors.extract(&doc).unwrap(),
      FieldValue::List(vec!["ann lee".into(), "bo li".into(), "cy wu".into()])
    );
    assert_eq!(keywords.extract(&doc).unwrap(), FieldValue::List(vec!["vr".into(), "selection".into()]));
    assert_eq!(missing.extract(&doc).unwrap(), FieldValue::List(Vec::new()));
  }

  #[test]
  fn test_json_custom_default() {
    let doc = Document::Json(json!({}));
    let rule = FieldRule::json("citations", false).with_default(json!(0));
    assert_eq!(rule.extract(&doc).unwrap(), FieldValue::Text("0".into()));
  }

  #[test]
  fn test_required_rule_reports_absent_path() {
    let doc = Document::Json(json!({ "response": { "numFound": 3 } }));
    let total = FieldRule::json("response.numFound", false).required();
    let typo = FieldRule::json("response.numFund", false).required();
    let ids = FieldRule::json("response.docs.*.id", true).required();
    assert_eq!(total.extract(&doc).unwrap(), FieldValue::Text("3".into()));
    assert!(matches!(typo.extract(&doc), Err(FinderError::Lookup { .. })));
    assert!(matches!(ids.extract(&doc), Err(FinderError::Lookup { .. })));

    let unset = FieldRule::json("", true).required();
    assert_eq!(unset.extract(&doc).unwrap(), FieldValue::List(Vec::new()));
  }

  #[test]
  fn test_json_type_mismatch_is_fatal() {
    let doc = Document::Json(json!({ "title": "scalar" }));
    let rule = FieldRule::json("title.text", false);
    assert!(matches!(rule.extract(&doc), Err(FinderError::TypeKind { .. })));
  }

  #[test]
  fn test_mode_mismatch() {
    let json_rule = FieldRule::json("title", false);
    let regex_rule = FieldRule::regex("title", false).unwrap();
    assert!(matches!(
      json_rule.extract(&text("{\"title\": \"x\"}")),
      Err(FinderError::TypeKind { found: "raw text", .. })
    ));
    assert!(matches!(
      regex_rule.extract(&Document::Json(json!({}))),
      Err(FinderError::TypeKind { found: "parsed JSON", .. })
    ));
  }

  #[test]
  fn test_title_case() {
    assert_eq!(title_case("john smith"), "John Smith");
    assert_eq!(title_case("JANE DOE"), "Jane Doe");
    assert_eq!(title_case("o'neil-smith"), "O'Neil-Smith");
    assert_eq!(title_case(""), "");
  }

  #[test]
  fn test_embedded_json_preprocessing() {
    let step = Preprocessing::EmbeddedJson(
      Regex::new(r"(?s)<script>window.__DATA__ = (\{.*?\});</script>").unwrap(),
    );
    let doc = text(r#"<html><script>window.__DATA__ = {"title": "Inner"};</script></html>"#);
    let doc = step.apply(doc).unwrap();
    assert_eq!(doc, Document::Json(json!({ "title": "Inner" })));
    assert_eq!(FieldRule::json("title", false).extract(&doc).unwrap(), FieldValue::Text("Inner".into()));

    // Only runs once per document
    assert!(matches!(step.apply(doc), Err(FinderError::TypeKind { .. })));
  }

  #[test]
  fn test_embedded_json_without_match() {
    let step = Preprocessing::EmbeddedJson(Regex::new(r"<script>(.*)</script>").unwrap());
    assert!(matches!(step.apply(text("<html></html>")), Err(FinderError::Json(_))));
  }
}
