//! The network seam between the scraper and the publishers it reads from.
//!
//! Scraping is written against the [`Fetcher`] trait, which turns a [`Request`] description
//! into a response body. This keeps the extraction and pagination logic independent of the
//! HTTP stack:
//!
//! - [`http`] - [`HttpFetcher`], the `reqwest` implementation used by the CLI
//! - [`cache`] - [`CachedFetcher`], an on-disk response cache wrapping another fetcher
//!
//! # Examples
//!
//! ```no_run
//! use finder::clients::{Fetcher, HttpFetcher, Request};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpFetcher::new();
//! let mut request = Request::get("https://dl.acm.org/action/doSearch");
//! request.payload.insert("AllField".into(), "virtual reality".into());
//! let body = fetcher.fetch(&request).await?;
//! # Ok(())
//! # }
//! ```

use super::*;

pub mod cache;
pub mod http;

pub use cache::{CachedFetcher, LoadFrom};
pub use http::HttpFetcher;

/// The HTTP method used for an endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
  /// Payload sent as query parameters
  #[default]
  Get,
  /// Payload sent as a request body
  Post,
}

/// How a POST payload is encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
  /// `application/x-www-form-urlencoded`
  #[default]
  Form,
  /// `application/json`
  Json,
}

/// A request for a listing page, a paper or a download.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
  /// The endpoint URL. Any query string or fragment it carries is dropped by
  /// [`HttpFetcher`]; parameters belong in the payload.
  pub url:      String,
  /// HTTP method
  pub method:   Method,
  /// Body encoding for POST requests
  pub encoding: Encoding,
  /// Parameters or body fields
  pub payload:  Map<String, Value>,
  /// Extra headers sent with the request
  pub headers:  BTreeMap<String, String>,
}

impl Request {
  /// Creates a GET request without parameters.
  pub fn get(url: impl Into<String>) -> Self { Self { url: url.into(), ..Default::default() } }

  /// Flattens the payload into string pairs for query strings and form bodies.
  ///
  /// Arrays repeat their key once per element; `null` values are skipped.
  pub fn pairs(&self) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(self.payload.len());
    for (key, value) in &self.payload {
      match value {
        Value::Null => {},
        Value::Array(items) => pairs.extend(
          items.iter().map(|item| (key.clone(), extract::value_to_string(item))),
        ),
        other => pairs.push((key.clone(), extract::value_to_string(other))),
      }
    }
    pairs
  }
}

/// A downloaded file.
#[derive(Debug, Clone, Default)]
pub struct Download {
  /// The response body
  pub bytes:               Vec<u8>,
  /// The `Content-Disposition` header, if the server sent one
  pub content_disposition: Option<String>,
}

/// Something that can answer requests.
///
/// Implementations perform all blocking I/O; the extraction engine only ever sees the
/// returned text.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
  /// Sends `request` and returns the response body as text.
  async fn fetch(&self, request: &Request) -> Result<String, FinderError>;

  /// Downloads the resource at `url`.
  async fn download(&self, url: &str) -> Result<Download, FinderError>;
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_request_pairs() {
    let mut request = Request::get("https://host/search");
    request.payload.insert("query".into(), json!("virtual reality"));
    request.payload.insert("pageSize".into(), json!(20));
    request.payload.insert("returnFacets".into(), json!(["ALL", "YEAR"]));
    request.payload.insert("unused".into(), Value::Null);

    let mut pairs = request.pairs();
    pairs.sort();
    assert_eq!(pairs, vec![
      ("pageSize".to_string(), "20".to_string()),
      ("query".to_string(), "virtual reality".to_string()),
      ("returnFacets".to_string(), "ALL".to_string()),
      ("returnFacets".to_string(), "YEAR".to_string()),
    ]);
  }

  #[test]
  fn test_method_names() {
    assert_eq!(serde_json::from_str::<Method>("\"POST\"").unwrap(), Method::Post);
    assert_eq!(serde_json::from_str::<Method>("\"GET\"").unwrap(), Method::Get);
    assert!(serde_json::from_str::<Method>("\"PUT\"").is_err());
  }
}
