//! `reqwest` implementation of [`Fetcher`].
//!
//! Every request carries a browser-like user agent, since several publishers refuse
//! requests from unknown clients, plus the headers of the request itself (typically a
//! session cookie configured on the job).

use reqwest::header;

use super::*;

/// User agent sent with every request.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, \
                          like Gecko) Chrome/84.0.4147.89 Safari/537.36";

/// Fetches listings, papers and PDFs over HTTP.
pub struct HttpFetcher {
  /// Internal web client used to connect to publishers.
  client: reqwest::Client,
}

impl HttpFetcher {
  /// Creates a new fetcher with a default `reqwest` client.
  pub fn new() -> Self { Self { client: reqwest::Client::new() } }
}

impl Default for HttpFetcher {
  fn default() -> Self { Self::new() }
}

/// Drops the query string and fragment of a configured URL.
fn base_with_path(url: &str) -> Result<url::Url, FinderError> {
  let mut url = url::Url::parse(url)?;
  url.set_query(None);
  url.set_fragment(None);
  Ok(url)
}

impl Fetcher for HttpFetcher {
  async fn fetch(&self, request: &Request) -> Result<String, FinderError> {
    let url = base_with_path(&request.url)?;
    debug!("{:?} {url} with {} parameters", request.method, request.payload.len());

    let builder = match (request.method, request.encoding) {
      (Method::Get, _) => self.client.get(url).query(&request.pairs()),
      (Method::Post, Encoding::Form) => self
        .client
        .post(url)
        .header(header::ACCEPT, "*/*")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded; charset=UTF-8")
        .form(&request.pairs()),
      (Method::Post, Encoding::Json) =>
        self.client.post(url).header(header::ACCEPT, "*/*").json(&request.payload),
    };

    let builder = request
      .headers
      .iter()
      .fold(builder.header(header::USER_AGENT, USER_AGENT), |builder, (name, value)| {
        builder.header(name.as_str(), value.as_str())
      });

    let response = builder.send().await?.error_for_status()?;
    trace!("Response status: {}", response.status());
    Ok(response.text().await?)
  }

  async fn download(&self, url: &str) -> Result<Download, FinderError> {
    let response = self
      .client
      .get(url)
      .header(header::USER_AGENT, USER_AGENT)
      .send()
      .await?
      .error_for_status()?;
    let content_disposition = response
      .headers()
      .get(header::CONTENT_DISPOSITION)
      .and_then(|value| value.to_str().ok())
      .map(str::to_string);
    let bytes = response.bytes().await?.to_vec();
    Ok(Download { bytes, content_disposition })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_base_with_path() {
    let url = base_with_path("https://dl.acm.org/action/doSearch?AllField=x#results").unwrap();
    assert_eq!(url.as_str(), "https://dl.acm.org/action/doSearch");
    assert!(matches!(base_with_path("not a url"), Err(FinderError::InvalidUrl(_))));
  }
}
