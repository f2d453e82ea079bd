//! Paper records and their extraction from fetched documents.
//!
//! A [`Paper`] is the flat record produced for every identifier found on a search listing.
//! Its fields are filled by the [`PaperRules`] compiled from a site configuration, and the
//! page and PDF URLs are injected from the configuration's URL templates.
//!
//! # Examples
//!
//! ```
//! use finder::{
//!   extract::{Document, FieldRule},
//!   paper::{Paper, PaperField, PaperRules},
//! };
//!
//! let mut rules = PaperRules::default();
//! rules.set(PaperField::Title, FieldRule::regex(r"<h1>(.*?)</h1>", false)?);
//! rules.set(PaperField::Authors, FieldRule::regex(r#"<a rel="author">(.*?)</a>"#, true)?);
//!
//! let html = r#"<h1>Gaze Pointing</h1><a rel="author">ada lovelace</a>"#;
//! let paper = Paper::extract(&Document::Text(html.into()), &rules)?;
//! assert_eq!(paper.title, "Gaze Pointing");
//! assert_eq!(paper.authors, vec!["Ada Lovelace"]);
//! # Ok::<(), finder::errors::FinderError>(())
//! ```

use super::*;

/// The fields of a [`Paper`], in record order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PaperField {
  /// The paper's title
  Title,
  /// The paper's authors
  Authors,
  /// The abstract
  Abstract,
  /// Author keywords
  Keywords,
  /// Journal, proceedings or other venue
  PublishedIn,
  /// Publication date as printed by the publisher
  PublicationDate,
  /// Citation count as printed by the publisher
  Citations,
  /// ISBN of the venue
  Isbn,
  /// The paper's DOI
  Doi,
  /// URL of the PDF, injected from the site configuration
  PdfUrl,
  /// URL of the paper page, injected from the site configuration
  PaperUrl,
}

impl PaperField {
  /// Every field, in record order.
  pub const ALL: [PaperField; 11] = [
    PaperField::Title,
    PaperField::Authors,
    PaperField::Abstract,
    PaperField::Keywords,
    PaperField::PublishedIn,
    PaperField::PublicationDate,
    PaperField::Citations,
    PaperField::Isbn,
    PaperField::Doi,
    PaperField::PdfUrl,
    PaperField::PaperUrl,
  ];

  /// The fields extracted from the paper document, as opposed to the injected URLs.
  pub const EXTRACTED: [PaperField; 9] = [
    PaperField::Title,
    PaperField::Authors,
    PaperField::Abstract,
    PaperField::Keywords,
    PaperField::PublishedIn,
    PaperField::PublicationDate,
    PaperField::Citations,
    PaperField::Isbn,
    PaperField::Doi,
  ];

  /// The record key of the field, as used in configurations, result files and queries.
  pub fn name(self) -> &'static str {
    match self {
      PaperField::Title => "title",
      PaperField::Authors => "authors",
      PaperField::Abstract => "abstract",
      PaperField::Keywords => "keywords",
      PaperField::PublishedIn => "published_in",
      PaperField::PublicationDate => "publication_date",
      PaperField::Citations => "citations",
      PaperField::Isbn => "isbn",
      PaperField::Doi => "doi",
      PaperField::PdfUrl => "pdf_url",
      PaperField::PaperUrl => "paper_url",
    }
  }

  /// Whether the field holds a list of values.
  pub fn is_multi(self) -> bool { matches!(self, PaperField::Authors | PaperField::Keywords) }
}

impl std::fmt::Display for PaperField {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.name()) }
}

impl FromStr for PaperField {
  type Err = FinderError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    PaperField::ALL
      .into_iter()
      .find(|field| field.name() == s)
      .ok_or_else(|| FinderError::MissingField(s.to_owned()))
  }
}

/// The extraction rules of every field a paper document carries.
///
/// Fields without a rule take their standard default (`""` or an empty list).
#[derive(Debug, Clone, Default)]
pub struct PaperRules {
  /// Rule per extracted field
  rules: BTreeMap<PaperField, FieldRule>,
}

impl PaperRules {
  /// Sets the rule for `field`.
  pub fn set(&mut self, field: PaperField, rule: FieldRule) { self.rules.insert(field, rule); }

  /// Returns the rule for `field`, if one was configured.
  pub fn get(&self, field: PaperField) -> Option<&FieldRule> { self.rules.get(&field) }

  /// Runs the rule for `field` against `document`.
  fn extract(&self, field: PaperField, document: &Document) -> Result<FieldValue, FinderError> {
    match self.rules.get(&field) {
      Some(rule) => rule.extract(document),
      None => rule_for_unset(field).extract(document),
    }
  }
}

/// The rule used for a field with no configuration.
fn rule_for_unset(field: PaperField) -> FieldRule {
  FieldRule::new(extract::ExtractionMode::Unset, field.is_multi())
}

/// A paper record with its extracted metadata.
///
/// The scalar fields hold the publisher's text as extracted, without any parsing of dates or
/// counts, so that every publisher fits the same record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
  /// The paper's title
  pub title:            String,
  /// The paper's authors, title-cased
  pub authors:          Vec<String>,
  /// The paper's abstract text
  #[serde(rename = "abstract")]
  pub abstract_text:    String,
  /// Author keywords
  pub keywords:         Vec<String>,
  /// Journal, proceedings or other venue
  pub published_in:     String,
  /// Publication date as printed by the publisher
  pub publication_date: String,
  /// Citation count as printed by the publisher
  pub citations:        String,
  /// ISBN of the venue, if printed
  pub isbn:             String,
  /// The paper's DOI, if printed
  pub doi:              String,
  /// URL to the paper's PDF, if the site configuration has a PDF template
  pub pdf_url:          Option<String>,
  /// URL of the page the paper was extracted from
  pub paper_url:        String,
}

impl Paper {
  /// Extracts a paper from a (preprocessed) document.
  ///
  /// The injected URL fields are left empty; see [`Paper::with_urls`].
  ///
  /// # Errors
  ///
  /// Returns [`FinderError::TypeKind`] when a configured rule does not fit the document.
  pub fn extract(document: &Document, rules: &PaperRules) -> Result<Self, FinderError> {
    let text = |field| rules.extract(field, document).map(FieldValue::into_text);
    let list = |field| rules.extract(field, document).map(FieldValue::into_list);

    Ok(Paper {
      title:            text(PaperField::Title)?,
      authors:          list(PaperField::Authors)?
        .iter()
        .map(|author| extract::title_case(author))
        .collect(),
      abstract_text:    text(PaperField::Abstract)?,
      keywords:         list(PaperField::Keywords)?,
      published_in:     text(PaperField::PublishedIn)?,
      publication_date: text(PaperField::PublicationDate)?,
      citations:        text(PaperField::Citations)?,
      isbn:             text(PaperField::Isbn)?,
      doi:              text(PaperField::Doi)?,
      pdf_url:          None,
      paper_url:        String::new(),
    })
  }

  /// Sets the injected URL fields.
  pub fn with_urls(mut self, paper_url: String, pdf_url: Option<String>) -> Self {
    self.paper_url = paper_url;
    self.pdf_url = pdf_url;
    self
  }

  /// Looks a field up by its record key.
  ///
  /// List fields are joined with `", "` and an absent PDF URL reads as `""`, the same text the
  /// CSV export writes for it. Returns `None` only for unknown keys.
  pub fn field(&self, name: &str) -> Option<Cow<'_, str>> {
    let field = name.parse::<PaperField>().ok()?;
    let value = match field {
      PaperField::Title => Cow::Borrowed(self.title.as_str()),
      PaperField::Authors => Cow::Owned(self.authors.join(", ")),
      PaperField::Abstract => Cow::Borrowed(self.abstract_text.as_str()),
      PaperField::Keywords => Cow::Owned(self.keywords.join(", ")),
      PaperField::PublishedIn => Cow::Borrowed(self.published_in.as_str()),
      PaperField::PublicationDate => Cow::Borrowed(self.publication_date.as_str()),
      PaperField::Citations => Cow::Borrowed(self.citations.as_str()),
      PaperField::Isbn => Cow::Borrowed(self.isbn.as_str()),
      PaperField::Doi => Cow::Borrowed(self.doi.as_str()),
      PaperField::PdfUrl => Cow::Borrowed(self.pdf_url.as_deref().unwrap_or_default()),
      PaperField::PaperUrl => Cow::Borrowed(self.paper_url.as_str()),
    };
    Some(value)
  }

  /// Download the paper's PDF into a directory.
  ///
  /// The file is named after the server's `Content-Disposition` header, or the last segment
  /// of the PDF URL. Returns the path written.
  ///
  /// # Errors
  ///
  /// Returns `FinderError` if:
  /// - The paper has no PDF URL
  /// - The download fails
  /// - Writing to the directory fails
  pub async fn download_pdf<F: Fetcher>(
    &self,
    fetcher: &F,
    dir: PathBuf,
  ) -> Result<PathBuf, FinderError> {
    let Some(pdf_url) = &self.pdf_url else {
      return Err(FinderError::MissingField(PaperField::PdfUrl.name().to_string()));
    };

    let download = fetcher.download(pdf_url).await?;
    trace!("{} pdf_url response: {} bytes", pdf_url, download.bytes.len());

    let file_name =
      format::download_file_name(pdf_url, download.content_disposition.as_deref(), ".pdf");
    let path = dir.join(file_name);
    debug!("Writing PDF to path: {path:?}");
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(&path, download.bytes).await?;
    Ok(path)
  }
}
