//! Text formatting utilities for URL templates and file names.
//!
//! Site configurations describe endpoints as templates with `{name}` placeholders, and
//! downloaded files are named after the URL they came from. This module fills templates
//! and turns arbitrary identifiers into filesystem-friendly names.
//!
//! # Examples
//!
//! ```
//! use finder::format;
//!
//! let url = format::insert_placeholder("https://dl.acm.org/doi/{identifier}", "identifier", "10.1145/1");
//! assert_eq!(url, "https://dl.acm.org/doi/10.1145/1");
//!
//! assert_eq!(format::safe_filename("10.1145/3313831 (v2)"), "10.1145_3313831__v2_");
//! ```

use lazy_static::lazy_static;

use super::*;

lazy_static! {
  /// Characters that are replaced in file names.
  static ref UNSAFE_FILENAME: Regex = Regex::new(r"[^.\w-]").unwrap();
  /// The file name announced by a `Content-Disposition` header.
  static ref DISPOSITION_FILENAME: Regex = Regex::new(r"filename=(.+)").unwrap();
}

/// Replaces every `{name}` placeholder in `template` with `value`.
///
/// Placeholders with other names are left untouched, so a template can be filled in
/// several passes.
pub fn insert_placeholder(template: &str, name: &str, value: impl std::fmt::Display) -> String {
  template.replace(&format!("{{{name}}}"), &value.to_string())
}

/// Replaces every character other than word characters, `.` and `-` with an underscore.
pub fn safe_filename(name: &str) -> String { UNSAFE_FILENAME.replace_all(name, "_").into_owned() }

/// Picks a file name for a download.
///
/// The server's `Content-Disposition` file name wins when present. Otherwise the last
/// segment of the URL path is used, made filesystem-safe and suffixed with `extension` if it
/// does not already end with it.
///
/// # Examples
///
/// ```
/// use finder::format::download_file_name;
///
/// assert_eq!(download_file_name("https://host/pdf/2301.07041", None, ".pdf"), "2301.07041.pdf");
/// assert_eq!(download_file_name("https://host/pdf/paper.pdf", None, ".pdf"), "paper.pdf");
/// assert_eq!(
///   download_file_name("https://host/get?id=1", Some("attachment; filename=final.pdf"), ".pdf"),
///   "final.pdf"
/// );
/// ```
pub fn download_file_name(url: &str, content_disposition: Option<&str>, extension: &str) -> String {
  if let Some(name) = content_disposition
    .and_then(|header| DISPOSITION_FILENAME.captures(header))
    .and_then(|captures| captures.get(1))
    .map(|m| m.as_str().trim().trim_matches('"'))
    .filter(|name| !name.is_empty())
  {
    return safe_filename(name);
  }

  let path = url::Url::parse(url).map(|url| url.path().to_string()).unwrap_or_else(|_| url.to_string());
  let last = path.rsplit('/').next().unwrap_or_default();
  let name = if last.is_empty() { "download" } else { last };
  let name = safe_filename(name);
  if name.ends_with(extension) {
    name
  } else {
    format!("{name}{extension}")
  }
}
