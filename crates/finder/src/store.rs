//! Result files and CSV export.
//!
//! Every finished scrape is stored as a JSON result file holding the kept papers and the
//! listing totals. Result files can be exported to CSV, appending to an existing export by
//! default so that several scrapes collect into a single table.

use std::path::Path;

use super::*;
use crate::paper::PaperField;

/// Separator used when a list field is written to a single CSV cell.
const LIST_SEPARATOR: &str = ", ";

/// The outcome of one scrape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeResult {
  /// Papers that passed every filter, in listing order
  pub papers:                 Vec<Paper>,
  /// Total number of results reported by the listing
  pub total_results:          u64,
  /// Number of papers kept
  pub total_filtered_results: usize,
  /// Number of listing pages fetched
  pub total_pages:            u64,
  /// When the scrape finished
  pub finished_at:            DateTime<Utc>,
}

impl ScrapeResult {
  /// Builds a result, counting the kept papers.
  pub fn new(papers: Vec<Paper>, total_results: u64, total_pages: u64) -> Self {
    Self {
      total_filtered_results: papers.len(),
      papers,
      total_results,
      total_pages,
      finished_at: Utc::now(),
    }
  }

  /// Keeps only the papers matching `query`, updating the kept count.
  ///
  /// The query is evaluated against every paper first; if it fails on any of them the
  /// result is left untouched.
  pub fn retain_matching(&mut self, query: &Query) -> Result<(), FinderError> {
    let keep = self.papers.iter().map(|paper| query.matches(paper)).collect::<Result<Vec<_>, _>>()?;
    let mut keep = keep.into_iter();
    self.papers.retain(|_| keep.next().unwrap_or(false));
    self.total_filtered_results = self.papers.len();
    Ok(())
  }

  /// Default location of result files, in the user's data directory.
  pub fn default_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("finder")
  }

  /// Path of the result file of job `name` on site configuration `config_name`.
  pub fn file_path(dir: &Path, config_name: &str, name: &str) -> PathBuf {
    dir.join(format::safe_filename(config_name)).join(format!("result_{}.json", format::safe_filename(name)))
  }

  /// Writes the result as pretty-printed JSON, creating parent directories.
  pub fn save(&self, path: impl AsRef<Path>) -> Result<(), FinderError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(self)?)?;
    debug!("Wrote {} papers to {}", self.papers.len(), path.display());
    Ok(())
  }

  /// Reads a result file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, FinderError> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
  }

  /// Exports the papers to a CSV file.
  ///
  /// # Arguments
  ///
  /// * `path` - The CSV file to write
  /// * `fields` - Record keys to export, in column order. Empty means every field.
  /// * `override_existing` - Rewrite an existing file instead of adding to it
  ///
  /// When the file exists and `override_existing` is not set, the papers are added below
  /// the existing rows. Cells are placed by column name: existing columns keep their order,
  /// fields the file lacks are added as new columns, and cells with no value stay empty.
  /// Nothing is written when there are no papers.
  ///
  /// # Errors
  ///
  /// Returns [`FinderError::MissingField`] for an unknown field name, before anything is
  /// written.
  pub fn export_csv(
    &self,
    path: impl AsRef<Path>,
    fields: &[String],
    override_existing: bool,
  ) -> Result<usize, FinderError> {
    let path = path.as_ref();
    if self.papers.is_empty() {
      info!("No papers to export to {}", path.display());
      return Ok(0);
    }

    let fields = if fields.is_empty() {
      PaperField::ALL.to_vec()
    } else {
      fields.iter().map(|name| name.parse()).collect::<Result<Vec<PaperField>, _>>()?
    };

    let (mut header, mut rows) = if path.exists() && !override_existing {
      read_csv(path)?
    } else {
      (Vec::new(), Vec::new())
    };
    for field in &fields {
      if !header.iter().any(|column| column == field.name()) {
        header.push(field.name().to_string());
      }
    }

    let columns = header
      .iter()
      .map(|column| fields.iter().copied().find(|field| field.name() == column))
      .collect::<Vec<_>>();
    let existing = rows.len();
    rows.extend(self.papers.iter().map(|paper| {
      columns.iter().map(|field| field.map(|field| cell(paper, field)).unwrap_or_default()).collect()
    }));

    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    writer.write_record(&header)?;
    for mut row in rows {
      if row.len() < header.len() {
        row.resize(header.len(), String::new());
      }
      writer.write_record(&row)?;
    }
    writer.flush()?;

    debug!("Exported {} papers to {} below {existing} existing rows", self.papers.len(), path.display());
    Ok(self.papers.len())
  }
}

/// Reads an existing export: its header and every row.
fn read_csv(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), FinderError> {
  let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
  let header = reader.headers()?.iter().map(str::to_string).collect();
  let rows = reader
    .records()
    .map(|record| record.map(|record| record.iter().map(str::to_string).collect()))
    .collect::<Result<Vec<Vec<String>>, _>>()?;
  Ok((header, rows))
}

/// Renders one CSV cell. An absent PDF URL is an empty cell.
fn cell(paper: &Paper, field: PaperField) -> String {
  match field {
    PaperField::Authors => paper.authors.join(LIST_SEPARATOR),
    PaperField::Keywords => paper.keywords.join(LIST_SEPARATOR),
    other => paper.field(other.name()).map(Cow::into_owned).unwrap_or_default(),
  }
}
