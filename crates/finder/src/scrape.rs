//! Running a scrape: paging through a search listing and extracting every paper on it.
//!
//! A [`Finder`] combines a [`Fetcher`], a compiled [`SiteConfig`] and a [`Job`]. It fetches
//! the first listing page, reads the total number of results from it to work out how many
//! pages follow, and for every identifier on every page fetches the paper, extracts it,
//! and keeps it if it passes the configured filters.
//!
//! Requests are made one at a time, pausing between papers as the site configuration asks.
//!
//! # Examples
//!
//! ```no_run
//! use finder::{clients::HttpFetcher, config::{Job, SiteConfig}, scrape::Finder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let site = SiteConfig::from_path("configs/springer.json")?;
//! let mut job = Job::new("vr");
//! job.config_name = Some("springer".into());
//! job.search_parameters.insert("query".into(), "(select* OR manipulat*) AND VR".into());
//!
//! let result = Finder::new(HttpFetcher::new(), site, job).run().await?;
//! println!("{} papers on {} pages", result.papers.len(), result.total_pages);
//! # Ok(())
//! # }
//! ```

use std::time::Instant;

use super::*;
use crate::{config::Job, store::ScrapeResult};

/// Placeholder for the page number in listing URL templates.
const PAGE_PLACEHOLDER: &str = "page";
/// Placeholder for the paper identifier in paper and PDF URL templates.
const IDENTIFIER_PLACEHOLDER: &str = "identifier";

/// Scrapes one job of one site configuration.
pub struct Finder<F> {
  /// Where documents come from
  fetcher: F,
  /// The compiled site configuration
  site:    SiteConfig,
  /// The job being run
  job:     Job,
}

impl<F: Fetcher> Finder<F> {
  /// Creates a finder.
  pub fn new(fetcher: F, site: SiteConfig, job: Job) -> Self { Self { fetcher, site, job } }

  /// The job being run.
  pub fn job(&self) -> &Job { &self.job }

  /// The fetcher used for requests.
  pub fn fetcher(&self) -> &F { &self.fetcher }

  /// Runs the whole scrape.
  ///
  /// # Errors
  ///
  /// Any error aborts the run: network and parsing failures, configured paths that do not
  /// fit the fetched data, and filters that cannot be evaluated.
  pub async fn run(&self) -> Result<ScrapeResult, FinderError> {
    let started = Instant::now();
    info!("Starting on {} - {}", self.job.config_name(), self.job.name);

    let start_page = self.site.pagination.start_page;
    let (list, mut papers) = self.fetch_parse_list(start_page).await?;
    let total_results = self.total_results(&list)?;

    let remaining = self.site.pagination.remaining_pages(total_results);
    let hours = total_results as f64 * self.site.sleep_between_requests.as_secs_f64() / 3600.0;
    info!("{total_results} results on {} pages, at least {hours:.2} hours", remaining + 1);

    for page in (start_page + 1)..=(start_page + remaining) {
      debug!("Fetching listing page {page} of {}", start_page + remaining);
      let (_, page_papers) = self.fetch_parse_list(page).await?;
      papers.extend(page_papers);
    }

    let result = ScrapeResult::new(papers, total_results, remaining + 1);
    info!(
      "Finished {} - {} in {:.4} seconds, kept {} papers",
      self.job.config_name(),
      self.job.name,
      started.elapsed().as_secs_f64(),
      result.total_filtered_results
    );
    Ok(result)
  }

  /// Fetches a listing page and every paper on it.
  ///
  /// Returns the listing document, for reading totals, and the papers that passed the
  /// filters.
  pub async fn fetch_parse_list(&self, page: u64) -> Result<(Document, Vec<Paper>), FinderError> {
    let list = self.fetch_list(page).await?;
    let identifiers = self.identifiers(&list)?;
    debug!("Found {} identifiers on page {page}", identifiers.len());
    let papers = self.fetch_parse_papers(&identifiers).await?;
    Ok((list, papers))
  }

  /// Fetches, extracts and filters the papers with the given identifiers, in order.
  pub async fn fetch_parse_papers(&self, identifiers: &[String]) -> Result<Vec<Paper>, FinderError> {
    let mut papers = Vec::with_capacity(identifiers.len());
    for (i, identifier) in identifiers.iter().enumerate() {
      trace!("Fetching paper {}/{}: {identifier}", i + 1, identifiers.len());
      let body = self.fetcher.fetch(&self.paper_request(identifier)).await?;
      match self.parse_paper(identifier, body) {
        Ok(Some(paper)) => papers.push(paper),
        Ok(None) => debug!("Dropped {identifier}: did not pass the filters"),
        Err(e) => {
          error!("Failed on {identifier}: {e}");
          return Err(e);
        },
      }
      if !self.site.sleep_between_requests.is_zero() {
        tokio::time::sleep(self.site.sleep_between_requests).await;
      }
    }
    Ok(papers)
  }

  /// Extracts a paper from a fetched body and applies the filters.
  ///
  /// Returns `None` when a filter rejects the paper.
  pub fn parse_paper(&self, identifier: &str, body: String) -> Result<Option<Paper>, FinderError> {
    let document = self.site.paper.document(body)?;
    let paper = Paper::extract(&document, &self.site.paper_rules)?
      .with_urls(self.paper_url(identifier), self.pdf_url(identifier));

    for filter in &self.site.filters {
      if !filter.matches(&paper)? {
        return Ok(None);
      }
    }
    Ok(Some(paper))
  }

  /// Fetches and preprocesses a listing page.
  async fn fetch_list(&self, page: u64) -> Result<Document, FinderError> {
    let body = self.fetcher.fetch(&self.list_request(page)).await?;
    self.site.list.document(body)
  }

  /// Reads the paper identifiers of a listing page.
  pub fn identifiers(&self, list: &Document) -> Result<Vec<String>, FinderError> {
    Ok(self.site.list_rules.identifiers.extract(list)?.into_list())
  }

  /// Reads the total number of results from a listing page.
  ///
  /// Thousands separators are ignored; anything that is not a number counts as zero.
  pub fn total_results(&self, list: &Document) -> Result<u64, FinderError> {
    let raw = self.site.list_rules.total_results.extract(list)?.into_text();
    let count = raw.replace(',', "").trim().parse().unwrap_or_else(|_| {
      warn!("Could not read the number of results from `{raw}`, assuming 0");
      0
    });
    Ok(count)
  }

  /// Builds the request for a listing page.
  ///
  /// The payload is the job's search parameters plus the configured paging parameters. In
  /// offset mode the page is converted to a record offset, which is also what fills the
  /// `{page}` placeholder of the URL.
  pub fn list_request(&self, page: u64) -> Request {
    let pagination = &self.site.pagination;
    let mut payload = self.job.search_parameters.clone();
    if let Some(param) = &pagination.per_page_param {
      payload.insert(param.clone(), Value::from(pagination.per_page));
    }
    let page = if let Some(param) = &pagination.page_param {
      let page = pagination.page_value(page);
      payload.insert(param.clone(), Value::from(page));
      page
    } else {
      page
    };

    Request {
      url: format::insert_placeholder(&self.site.list.url, PAGE_PLACEHOLDER, page),
      method: self.site.list.method,
      encoding: self.site.list.encoding,
      payload,
      headers: self.job.headers.clone(),
    }
  }

  /// Builds the request for a paper.
  pub fn paper_request(&self, identifier: &str) -> Request {
    Request {
      url: self.paper_url(identifier),
      method: self.site.paper.method,
      encoding: self.site.paper.encoding,
      payload: Map::new(),
      headers: self.job.headers.clone(),
    }
  }

  /// The page URL of a paper.
  pub fn paper_url(&self, identifier: &str) -> String {
    format::insert_placeholder(&self.site.paper.url, IDENTIFIER_PLACEHOLDER, identifier)
  }

  /// The PDF URL of a paper, if the site configuration has a PDF template.
  pub fn pdf_url(&self, identifier: &str) -> Option<String> {
    self
      .site
      .pdf_url
      .as_deref()
      .map(|template| format::insert_placeholder(template, IDENTIFIER_PLACEHOLDER, identifier))
  }

  /// Downloads the PDF of every paper that has one into `dir`.
  ///
  /// Download failures are logged and skipped so that one missing file does not lose the
  /// rest. Returns the paths written.
  pub async fn download_pdfs(&self, papers: &[Paper], dir: &std::path::Path) -> Vec<PathBuf> {
    let mut written = Vec::new();
    for paper in papers.iter().filter(|paper| paper.pdf_url.is_some()) {
      match paper.download_pdf(&self.fetcher, dir.to_path_buf()).await {
        Ok(path) => written.push(path),
        Err(e) => warn!("Could not download PDF of `{}`: {e}", paper.title),
      }
      if !self.site.sleep_between_requests.is_zero() {
        tokio::time::sleep(self.site.sleep_between_requests).await;
      }
    }
    written
  }
}
