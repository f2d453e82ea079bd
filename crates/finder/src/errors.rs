//! Error types for the finder library.
//!
//! This module provides a single error type covering every failure mode of a scrape:
//! - Path resolution against JSON documents (absence and structural mismatch)
//! - Query documents used to post-filter papers
//! - Site configuration loading
//! - Network, serialization and file system operations
//!
//! # Examples
//!
//! ```
//! use finder::{errors::FinderError, path::resolve};
//! use serde_json::json;
//!
//! let doc = json!({ "a": "scalar" });
//! match resolve(&doc, "a.b", None) {
//!   Err(FinderError::TypeKind { path, .. }) => println!("Path does not fit the data: {path}"),
//!   Err(e) => println!("Other error: {e}"),
//!   Ok(value) => println!("Found: {value}"),
//! }
//! ```

use thiserror::Error;

/// Errors that can occur when scraping and extracting papers.
///
/// The first four variants are raised by the extraction engine itself and have distinct
/// recovery rules:
/// - [`FinderError::Lookup`] is the only one a caller-supplied default can absorb
/// - [`FinderError::TypeKind`] means a configured path does not describe the data
/// - [`FinderError::InvalidQuery`] means a query document was authored incorrectly
/// - [`FinderError::MissingField`] means a query or export referenced an unknown field
///
/// The remaining variants wrap errors from the surrounding I/O layer.
#[derive(Error, Debug)]
pub enum FinderError {
  /// A key or index addressed by a path does not exist.
  ///
  /// Raised by [`crate::path::resolve`] when no default was supplied. The string is the
  /// full path expression that was being resolved.
  #[error("No value found at path `{path}`")]
  Lookup {
    /// The path expression being resolved
    path: String,
  },

  /// A path tried to descend into a value of the wrong kind.
  ///
  /// This occurs when:
  /// - A key or index segment is applied to a scalar
  /// - The wildcard `*` is applied to something other than a sequence
  /// - A JSON rule is run against raw text, or a regex rule against parsed JSON
  ///
  /// Defaults never suppress this error.
  #[error("Cannot resolve `{path}`: found {found} where a composite was required")]
  TypeKind {
    /// The path expression being resolved
    path:  String,
    /// The kind of value that was found instead
    found: &'static str,
  },

  /// A query document contained more than one `match` key.
  ///
  /// The parameter is the number of keys found.
  #[error("A match clause must not have more than 1 key, found {0}")]
  InvalidQuery(usize),

  /// A record does not carry the field referenced by a query or an export.
  #[error("Could not find field `{0}` in paper")]
  MissingField(String),

  /// The site configuration or a job definition is malformed.
  #[error("Invalid configuration: {0}")]
  InvalidConfig(String),

  /// A configured regular expression failed to compile.
  #[error(transparent)]
  Regex(#[from] regex::Error),

  /// JSON (de)serialization failed.
  ///
  /// This covers site configurations, JSON responses, embedded JSON blobs and
  /// result files.
  #[error(transparent)]
  Json(#[from] serde_json::Error),

  /// A network request failed.
  ///
  /// This can occur when:
  /// - The network is unavailable
  /// - The server is unreachable
  /// - The server answered with an error status
  #[error(transparent)]
  Network(#[from] reqwest::Error),

  /// Failed to parse a URL built from a configured template.
  #[error(transparent)]
  InvalidUrl(#[from] url::ParseError),

  /// Writing the CSV export failed.
  #[error(transparent)]
  Csv(#[from] csv::Error),

  /// A file system operation failed.
  #[error(transparent)]
  Path(#[from] std::io::Error),
}

impl FinderError {
  /// Checks if this error only reports an absent key or index.
  ///
  /// Absence is the one condition a default can stand in for; every other error from the
  /// extraction engine is fatal.
  ///
  /// ```
  /// use finder::path::resolve;
  /// use serde_json::json;
  ///
  /// let err = resolve(&json!({}), "missing", None).unwrap_err();
  /// assert!(err.is_lookup());
  /// ```
  pub fn is_lookup(&self) -> bool { matches!(self, FinderError::Lookup { .. }) }

  /// Checks if this error points at a mistake in a site configuration or query document
  /// rather than at the fetched data or the environment.
  pub fn is_config_error(&self) -> bool {
    matches!(
      self,
      FinderError::TypeKind { .. }
        | FinderError::InvalidQuery(_)
        | FinderError::MissingField(_)
        | FinderError::InvalidConfig(_)
        | FinderError::Regex(_)
    )
  }
}
