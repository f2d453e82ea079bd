//! On-disk response cache in front of another [`Fetcher`].
//!
//! Every fetched body is written below the cache directory, one file per distinct request,
//! so that a scrape can be re-run (for instance after fixing an extraction rule) without
//! hitting the publisher again. Downloads are passed through uncached.

use std::path::Path;

use sha2::{Digest, Sha256};

use super::*;

/// Longest readable URL prefix kept in a cache file name.
const NAME_PREFIX_LEN: usize = 80;

/// Where a [`CachedFetcher`] reads bodies from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadFrom {
  /// Use a cached body when there is one, otherwise fetch and cache it
  #[default]
  Cache,
  /// Always fetch, refreshing the cached body
  Url,
}

impl FromStr for LoadFrom {
  type Err = FinderError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "cache" => Ok(LoadFrom::Cache),
      "url" => Ok(LoadFrom::Url),
      other => Err(FinderError::InvalidConfig(format!(
        "unknown load source `{other}`, expected `cache` or `url`"
      ))),
    }
  }
}

/// Caches the bodies returned by an inner fetcher.
pub struct CachedFetcher<F> {
  /// The fetcher that talks to the publisher
  inner:     F,
  /// Directory holding the cached bodies
  dir:       PathBuf,
  /// Whether cached bodies are read
  load_from: LoadFrom,
}

impl<F: Fetcher> CachedFetcher<F> {
  /// Creates a cache in `dir` in front of `inner`.
  pub fn new(inner: F, dir: impl Into<PathBuf>, load_from: LoadFrom) -> Self {
    Self { inner, dir: dir.into(), load_from }
  }

  /// The wrapped fetcher.
  pub fn inner(&self) -> &F { &self.inner }

  /// The cache directory.
  pub fn dir(&self) -> &Path { &self.dir }

  /// The file caching the body of `request`.
  ///
  /// Named after the URL for readability, with a hash of the method, URL and payload telling
  /// apart requests to the same URL (such as POSTed listing pages).
  pub fn cache_path(&self, request: &Request) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(format!("{:?} {}", request.method, request.url).as_bytes());
    hasher.update(Value::Object(request.payload.clone()).to_string().as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let prefix = format::safe_filename(&request.url).chars().take(NAME_PREFIX_LEN).collect::<String>();
    self.dir.join(format!("{prefix}_{}.html", &hash[..16]))
  }
}

impl<F: Fetcher> Fetcher for CachedFetcher<F> {
  async fn fetch(&self, request: &Request) -> Result<String, FinderError> {
    let path = self.cache_path(request);
    if self.load_from == LoadFrom::Cache && path.exists() {
      trace!("Loading {} from {}", request.url, path.display());
      return Ok(tokio::fs::read_to_string(&path).await?);
    }

    let body = self.inner.fetch(request).await?;
    tokio::fs::create_dir_all(&self.dir).await?;
    tokio::fs::write(&path, &body).await?;
    trace!("Cached {} at {}", request.url, path.display());
    Ok(body)
  }

  async fn download(&self, url: &str) -> Result<Download, FinderError> { self.inner.download(url).await }
}
