//! A library for scraping academic paper metadata from publisher search pages, driven
//! entirely by a declarative site configuration.
//!
//! A site configuration describes a publisher's search listing and paper-detail endpoints
//! (URL templates, HTTP methods) together with extraction rules that are either regular
//! expressions run against raw markup or dotted paths resolved against parsed JSON. The
//! library paginates the listing, extracts identifiers, fetches and extracts every paper,
//! filters the records with an optional query document, and stores the results.
//!
//! # Example
//! ```rust,no_run
//! use finder::{clients::HttpFetcher, config::{Job, SiteConfig}, scrape::Finder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!   let site = SiteConfig::from_path("configs/acm.json")?;
//!   let job = Job::new("uist");
//!   let result = Finder::new(HttpFetcher::new(), site, job).run().await?;
//!   println!("Kept {} of {} papers", result.total_filtered_results, result.total_results);
//!
//!   Ok(())
//! }
//! ```

#![warn(missing_docs, clippy::missing_docs_in_private_items)]
use std::{borrow::Cow, collections::BTreeMap, path::PathBuf, str::FromStr};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, trace, warn};
#[cfg(test)] use tracing_test::traced_test;

pub mod clients;
pub mod config;
pub mod errors;
pub mod extract;
pub mod format;
pub mod paper;
pub mod path;
pub mod query;
pub mod scrape;
pub mod store;

use clients::{Fetcher, Request};
use config::SiteConfig;
use errors::FinderError;
use extract::{Document, FieldRule, FieldValue};
use paper::Paper;
use query::Query;
