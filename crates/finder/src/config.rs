//! Site configurations and scrape jobs.
//!
//! A site configuration is a JSON document describing one publisher: where its search
//! listing and paper pages live, how to page through the listing, and how every field is
//! extracted. It is parsed once into a [`SiteConfig`], at which point every regular
//! expression is compiled and every field's [`ExtractionMode`](crate::extract::ExtractionMode)
//! is fixed: fields of endpoints marked `expect-json` use the `json.*` paths, all others the
//! `regex.*` patterns.
//!
//! A [`Job`] names one scrape of a site configuration with a set of search parameters.
//!
//! # Examples
//!
//! ```
//! use finder::config::SiteConfig;
//!
//! let site: SiteConfig = r#"{
//!   "urls": {
//!     "list": { "url": "https://host/search", "per-page": 50, "params": { "page": "page" } },
//!     "paper": { "url": "https://host/paper/{identifier}", "expect-json": true },
//!     "pdf": "https://host/pdf/{identifier}"
//!   },
//!   "regex": { "list": { "identifiers": "data-id=\"(\\d+)\"" } },
//!   "json": { "paper": { "title": "title", "authors": "authors.*.name" } }
//! }"#
//! .parse()?;
//!
//! assert_eq!(site.pagination.per_page, 50);
//! assert!(site.paper.expect_json);
//! # Ok::<(), finder::errors::FinderError>(())
//! ```

use std::{path::Path, time::Duration};

use super::*;
use crate::{
  clients::{Encoding, Method},
  extract::Preprocessing,
  paper::{PaperField, PaperRules},
};

/// Listing page size used when a configuration does not state one.
pub const DEFAULT_PER_PAGE: u64 = 500;

/// Raw site configuration document, as written by hand.
#[derive(Debug, Deserialize)]
struct RawConfig {
  /// Endpoint templates
  urls:                   RawUrls,
  /// Regular expressions for text endpoints
  #[serde(default)]
  regex:                  RawRules,
  /// Paths for JSON endpoints
  #[serde(default)]
  json:                   RawRules,
  /// Transforms applied to fetched documents
  #[serde(default)]
  preprocessing:          RawPreprocessingStages,
  /// Filters applied to extracted papers
  #[serde(default)]
  postprocessing:         RawPostprocessingStages,
  /// Pause after every paper request, in seconds
  #[serde(default)]
  sleep_between_requests: f64,
}

/// The `urls` section.
#[derive(Debug, Deserialize)]
struct RawUrls {
  /// The search listing endpoint
  list:  RawEndpoint,
  /// The paper endpoint
  paper: RawEndpoint,
  /// PDF URL template
  #[serde(default)]
  pdf:   Option<String>,
}

/// One endpoint of the `urls` section.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawEndpoint {
  /// URL template
  url:         String,
  /// HTTP method
  #[serde(default)]
  method:      Method,
  /// Whether a POST sends a JSON body instead of a form
  #[serde(default)]
  send_json:   bool,
  /// Whether the response is JSON
  #[serde(default)]
  expect_json: bool,
  /// Listing page size
  #[serde(default)]
  per_page:    Option<u64>,
  /// First listing page
  #[serde(default)]
  start_page:  Option<u64>,
  /// Names of the paging parameters
  #[serde(default)]
  params:      RawParams,
}

/// Paging parameter names of the listing endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawParams {
  /// Parameter carrying the page (or offset)
  #[serde(default)]
  page:     Option<String>,
  /// Parameter carrying the page size
  #[serde(default)]
  per_page: Option<String>,
  /// Whether the page parameter is a record offset
  #[serde(default)]
  offset:   bool,
}

/// Field expressions per endpoint, for either the `regex` or the `json` section.
#[derive(Debug, Default, Deserialize)]
struct RawRules {
  /// Listing fields
  #[serde(default)]
  list:  BTreeMap<String, String>,
  /// Paper fields
  #[serde(default)]
  paper: BTreeMap<String, String>,
}

/// The `preprocessing` section.
#[derive(Debug, Default, Deserialize)]
struct RawPreprocessingStages {
  /// Steps for listing documents
  #[serde(default)]
  list:  Vec<RawPreprocessing>,
  /// Steps for paper documents
  #[serde(default)]
  paper: Vec<RawPreprocessing>,
}

/// One preprocessing step.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawPreprocessing {
  /// Unwrap a JSON blob embedded in markup
  EmbeddedJson {
    /// Pattern whose first match (or first group) is the blob
    regex: String,
  },
}

/// The `postprocessing` section.
#[derive(Debug, Default, Deserialize)]
struct RawPostprocessingStages {
  /// Steps for extracted papers
  #[serde(default)]
  paper: Vec<RawPostprocessing>,
}

/// One postprocessing step.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawPostprocessing {
  /// Keep only papers matching a query document
  Query {
    /// The query document
    query: Query,
  },
}

/// A listing or paper endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
  /// URL template with a `{page}` or `{identifier}` placeholder
  pub url:           String,
  /// HTTP method
  pub method:        Method,
  /// Body encoding of POST requests
  pub encoding:      Encoding,
  /// Whether fields of this endpoint are JSON paths
  pub expect_json:   bool,
  /// Transforms applied once to every fetched document, in order
  pub preprocessing: Vec<Preprocessing>,
}

impl Endpoint {
  /// Wraps a response body into a document ready for field extraction.
  ///
  /// Bodies are parsed as JSON only when the endpoint expects JSON and no preprocessing step
  /// produces the JSON itself.
  pub fn document(&self, body: String) -> Result<Document, FinderError> {
    let mut document = Document::from_body(body, self.expect_json && self.preprocessing.is_empty())?;
    for step in &self.preprocessing {
      document = step.apply(document)?;
    }
    Ok(document)
  }
}

/// How the listing is paged through.
#[derive(Debug, Clone)]
pub struct Pagination {
  /// Number of results per listing page
  pub per_page:       u64,
  /// Number of the first listing page
  pub start_page:     u64,
  /// Parameter carrying the page number, if the listing takes one
  pub page_param:     Option<String>,
  /// Parameter carrying the page size, if the listing takes one
  pub per_page_param: Option<String>,
  /// Whether the page parameter is a record offset (`page * per_page`)
  pub offset:         bool,
}

impl Pagination {
  /// The value sent for `page`: the page itself, or its first record in offset mode.
  pub fn page_value(&self, page: u64) -> u64 { if self.offset { page * self.per_page } else { page } }

  /// Number of listing pages after the first needed to cover `total_results`.
  pub fn remaining_pages(&self, total_results: u64) -> u64 {
    total_results.div_ceil(self.per_page).saturating_sub(1)
  }
}

/// Extraction rules of the listing endpoint.
#[derive(Debug, Clone)]
pub struct ListRules {
  /// Paper identifiers on a listing page
  pub identifiers:   FieldRule,
  /// Total number of results of the search
  pub total_results: FieldRule,
}

/// A compiled site configuration.
#[derive(Debug, Clone)]
pub struct SiteConfig {
  /// The search listing endpoint
  pub list:                   Endpoint,
  /// Paging of the listing
  pub pagination:             Pagination,
  /// Rules for listing pages
  pub list_rules:             ListRules,
  /// The paper endpoint
  pub paper:                  Endpoint,
  /// Rules for paper documents
  pub paper_rules:            PaperRules,
  /// PDF URL template with an `{identifier}` placeholder
  pub pdf_url:                Option<String>,
  /// Queries every kept paper must satisfy
  pub filters:                Vec<Query>,
  /// Pause after every paper request
  pub sleep_between_requests: Duration,
}

impl SiteConfig {
  /// Loads and compiles a site configuration file.
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FinderError> {
    let path = path.as_ref();
    debug!("Loading site configuration from {}", path.display());
    std::fs::read_to_string(path)?.parse()
  }

  /// Compiles a raw configuration document.
  fn compile(raw: RawConfig) -> Result<Self, FinderError> {
    let per_page = raw.urls.list.per_page.unwrap_or(DEFAULT_PER_PAGE);
    if per_page == 0 {
      return Err(FinderError::InvalidConfig("urls.list.per-page must be positive".into()));
    }
    let sleep_between_requests = Duration::try_from_secs_f64(raw.sleep_between_requests)
      .map_err(|e| FinderError::InvalidConfig(format!("sleep_between_requests: {e}")))?;

    let list = endpoint(&raw.urls.list, &raw.preprocessing.list, "list")?;
    let paper = endpoint(&raw.urls.paper, &raw.preprocessing.paper, "paper")?;

    // A listing that does not fit its paths is an error, not an empty page
    let list_rule = |name: &str, multi: bool| {
      rule(list.expect_json, raw.json.list.get(name), raw.regex.list.get(name), multi)
        .map(FieldRule::required)
    };
    let list_rules = ListRules {
      identifiers:   list_rule("identifiers", true)?,
      total_results: list_rule("total_number_of_results", false)?,
    };

    let mut paper_rules = PaperRules::default();
    for field in PaperField::EXTRACTED {
      let name = field.name();
      let compiled =
        rule(paper.expect_json, raw.json.paper.get(name), raw.regex.paper.get(name), field.is_multi())?;
      paper_rules.set(field, compiled);
    }
    let section = if paper.expect_json { &raw.json.paper } else { &raw.regex.paper };
    for name in section.keys() {
      if name.parse::<PaperField>().map_or(true, |field| !PaperField::EXTRACTED.contains(&field)) {
        warn!("Ignoring unknown paper field `{name}` in site configuration");
      }
    }

    let filters = raw
      .postprocessing
      .paper
      .into_iter()
      .map(|RawPostprocessing::Query { query }| query.validate().map(|()| query))
      .collect::<Result<Vec<_>, _>>()?;

    let params = raw.urls.list.params;
    Ok(SiteConfig {
      pagination: Pagination {
        per_page,
        start_page: raw.urls.list.start_page.unwrap_or(0),
        page_param: params.page.filter(|p| !p.is_empty()),
        per_page_param: params.per_page.filter(|p| !p.is_empty()),
        offset: params.offset,
      },
      list,
      list_rules,
      paper,
      paper_rules,
      pdf_url: raw.urls.pdf.filter(|url| !url.is_empty()),
      filters,
      sleep_between_requests,
    })
  }
}

impl FromStr for SiteConfig {
  type Err = FinderError;

  fn from_str(s: &str) -> Result<Self, Self::Err> { Self::compile(serde_json::from_str(s)?) }
}

/// Compiles one endpoint with its preprocessing steps.
fn endpoint(
  raw: &RawEndpoint,
  preprocessing: &[RawPreprocessing],
  name: &str,
) -> Result<Endpoint, FinderError> {
  if raw.url.is_empty() {
    return Err(FinderError::InvalidConfig(format!("urls.{name}.url must not be empty")));
  }
  let preprocessing = preprocessing
    .iter()
    .map(|step| -> Result<Preprocessing, FinderError> {
      match step {
        RawPreprocessing::EmbeddedJson { regex } => Ok(Preprocessing::EmbeddedJson(Regex::new(regex)?)),
      }
    })
    .collect::<Result<Vec<_>, _>>()?;
  if !preprocessing.is_empty() && !raw.expect_json {
    return Err(FinderError::InvalidConfig(format!(
      "embedded_json preprocessing of {name} documents requires urls.{name}.expect-json"
    )));
  }

  Ok(Endpoint {
    url: raw.url.clone(),
    method: raw.method,
    encoding: if raw.send_json { Encoding::Json } else { Encoding::Form },
    expect_json: raw.expect_json,
    preprocessing,
  })
}

/// Picks the JSON path or the regex of a field depending on the endpoint kind.
fn rule(
  expect_json: bool,
  json: Option<&String>,
  regex: Option<&String>,
  multi: bool,
) -> Result<FieldRule, FinderError> {
  if expect_json {
    Ok(FieldRule::json(json.map_or("", String::as_str), multi))
  } else {
    FieldRule::regex(regex.map_or("", String::as_str), multi)
  }
}

/// A named scrape of one site configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
  /// Name of the scrape, used to name its result file
  pub name:              String,
  /// Site configuration to use; defaults to `name`
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub config_name:       Option<String>,
  /// Parameters sent with every listing request
  #[serde(default)]
  pub search_parameters: Map<String, Value>,
  /// Headers sent with every request, such as a session cookie
  #[serde(default)]
  pub headers:           BTreeMap<String, String>,
}

impl Job {
  /// Creates a job without search parameters for the site configuration named `name`.
  pub fn new(name: impl Into<String>) -> Self { Self { name: name.into(), ..Default::default() } }

  /// The site configuration this job uses.
  pub fn config_name(&self) -> &str { self.config_name.as_deref().unwrap_or(&self.name) }

  /// Where the job's site configuration lives inside `configs_dir`.
  pub fn site_config_path(&self, configs_dir: &Path) -> PathBuf {
    configs_dir.join(format!("{}.json", self.config_name()))
  }

  /// Loads a jobs file: a JSON array of jobs.
  pub fn load_all(path: impl AsRef<Path>) -> Result<Vec<Job>, FinderError> {
    let jobs: Vec<Job> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    if let Some(job) = jobs.iter().find(|job| job.name.is_empty()) {
      return Err(FinderError::InvalidConfig(format!("job without a name: {job:?}")));
    }
    Ok(jobs)
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::extract::ExtractionMode;

  fn html_site() -> Value {
    json!({
      "urls": {
        "list": {
          "url": "https://dl.acm.org/action/doSearch?startPage={page}",
          "per-page": 20,
          "start-page": 0,
          "params": { "page": "startPage", "per-page": "pageSize" }
        },
        "paper": { "url": "https://dl.acm.org/doi/{identifier}" },
        "pdf": "https://dl.acm.org/doi/pdf/{identifier}"
      },
      "regex": {
        "list": {
          "identifiers": "<a href=\"/doi/(10\\.[^\"]+)\"",
          "total_number_of_results": "<span class=\"hitsLength\">([\\d,]+)</span>"
        },
        "paper": {
          "title": "<h1 class=\"citation__title\">(.*?)</h1>",
          "authors": "<span class=\"loa__author-name\">(.*?)</span>",
          "doi": "https://doi.org/(10\\.[^\"]+)"
        }
      },
      "postprocessing": {
        "paper": [{ "type": "query", "query": { "match": { "title": "select*" } } }]
      },
      "sleep_between_requests": 0.5
    })
  }

  fn compile(value: Value) -> Result<SiteConfig, FinderError> { value.to_string().parse() }

  #[test]
  fn test_compile_html_site() {
    let site = compile(html_site()).unwrap();

    assert_eq!(site.pagination.per_page, 20);
    assert_eq!(site.pagination.page_param.as_deref(), Some("startPage"));
    assert_eq!(site.pagination.per_page_param.as_deref(), Some("pageSize"));
    assert_eq!(site.list.method, Method::Get);
    assert!(matches!(site.list_rules.identifiers.mode, ExtractionMode::Regex(_)));
    assert!(site.list_rules.identifiers.multi);
    assert!(matches!(
      site.paper_rules.get(PaperField::Title).map(|r| &r.mode),
      Some(ExtractionMode::Regex(_))
    ));
    assert!(matches!(
      site.paper_rules.get(PaperField::Abstract).map(|r| &r.mode),
      Some(ExtractionMode::Unset)
    ));
    assert_eq!(site.filters, vec![Query::matching("title", "select*")]);
    assert_eq!(site.sleep_between_requests, Duration::from_millis(500));
    assert_eq!(site.pdf_url.as_deref(), Some("https://dl.acm.org/doi/pdf/{identifier}"));
  }

  #[test]
  fn test_compile_json_site() {
    let site = compile(json!({
      "urls": {
        "list": { "url": "https://host/rest/search", "method": "POST", "send-json": true,
                  "expect-json": true, "params": { "page": "pageNumber", "offset": true } },
        "paper": { "url": "https://host/document/{identifier}", "expect-json": true }
      },
      "json": {
        "list": { "identifiers": "records.*.articleNumber", "total_number_of_results": "totalRecords" },
        "paper": { "title": "title", "authors": "authors.*.name" }
      },
      "preprocessing": {
        "paper": [{ "type": "embedded_json", "regex": "metadata=(\\{.*\\});" }]
      }
    }))
    .unwrap();

    assert_eq!(site.list.method, Method::Post);
    assert_eq!(site.list.encoding, Encoding::Json);
    assert_eq!(site.pagination.per_page, DEFAULT_PER_PAGE);
    assert!(site.pagination.offset);
    assert_eq!(site.pagination.page_value(2), 1000);
    assert!(matches!(&site.list_rules.identifiers.mode, ExtractionMode::Json(p) if p == "records.*.articleNumber"));
    assert_eq!(site.paper.preprocessing.len(), 1);
    assert!(site.pdf_url.is_none());
    assert!(site.filters.is_empty());
  }

  #[test]
  fn test_remaining_pages() {
    let site = compile(html_site()).unwrap();
    assert_eq!(site.pagination.remaining_pages(0), 0);
    assert_eq!(site.pagination.remaining_pages(20), 0);
    assert_eq!(site.pagination.remaining_pages(21), 1);
    assert_eq!(site.pagination.remaining_pages(95), 4);
  }

  #[test]
  fn test_rejects_invalid_configs() {
    let mut zero = html_site();
    zero["urls"]["list"]["per-page"] = json!(0);
    assert!(matches!(compile(zero), Err(FinderError::InvalidConfig(_))));

    let mut bad_regex = html_site();
    bad_regex["regex"]["paper"]["title"] = json!("(unclosed");
    assert!(matches!(compile(bad_regex), Err(FinderError::Regex(_))));

    let mut bad_query = html_site();
    bad_query["postprocessing"]["paper"][0]["query"] =
      json!({ "must": [{ "match": { "title": "a", "abstract": "b" } }] });
    assert!(matches!(compile(bad_query), Err(FinderError::InvalidQuery(2))));

    let mut text_embedded = html_site();
    text_embedded["preprocessing"] = json!({ "paper": [{ "type": "embedded_json", "regex": "(.*)" }] });
    assert!(matches!(compile(text_embedded), Err(FinderError::InvalidConfig(_))));

    for sleep in [json!(-1.0), json!(1e30)] {
      let mut bad_sleep = html_site();
      bad_sleep["sleep_between_requests"] = sleep;
      assert!(matches!(compile(bad_sleep), Err(FinderError::InvalidConfig(_))));
    }

    let mut unknown_step = html_site();
    unknown_step["preprocessing"] = json!({ "paper": [{ "type": "translate" }] });
    assert!(matches!(compile(unknown_step), Err(FinderError::Json(_))));

    assert!(matches!(compile(json!({ "urls": {} })), Err(FinderError::Json(_))));
  }

  #[test]
  fn test_endpoint_document() {
    let site = compile(json!({
      "urls": {
        "list": { "url": "https://host/list", "expect-json": true },
        "paper": { "url": "https://host/{identifier}", "expect-json": true }
      },
      "preprocessing": {
        "paper": [{ "type": "embedded_json", "regex": "<script>(.*?)</script>" }]
      }
    }))
    .unwrap();

    let list = site.list.document(r#"{"total": 3}"#.to_string()).unwrap();
    assert_eq!(list, Document::Json(json!({ "total": 3 })));
    let paper = site.paper.document(r#"<script>{"title": "T"}</script>"#.to_string()).unwrap();
    assert_eq!(paper, Document::Json(json!({ "title": "T" })));
  }

  #[test]
  fn test_job_defaults() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("jobs.json");
    std::fs::write(
      &path,
      r#"[
        { "name": "uist", "config_name": "acm", "search_parameters": { "AfterYear": "2000" } },
        { "name": "springer" }
      ]"#,
    )?;

    let jobs = Job::load_all(&path)?;
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].config_name(), "acm");
    assert_eq!(jobs[0].search_parameters["AfterYear"], json!("2000"));
    assert_eq!(jobs[1].config_name(), "springer");
    assert_eq!(jobs[1].site_config_path(Path::new("configs")), PathBuf::from("configs/springer.json"));

    std::fs::write(&path, r#"[{ "name": "" }]"#)?;
    assert!(matches!(Job::load_all(&path), Err(FinderError::InvalidConfig(_))));
    Ok(())
  }
}
