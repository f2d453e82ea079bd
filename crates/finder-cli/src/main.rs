use std::path::{Path, PathBuf};

use clap::{builder::ArgAction, Parser, Subcommand};
use console::{style, Emoji};
use errors::FinderCliErrors;
use finder::{
  clients::{CachedFetcher, Fetcher, HttpFetcher, LoadFrom},
  config::{Job, SiteConfig},
  format,
  query::Query,
  scrape::Finder,
  store::ScrapeResult,
};
use tracing::{debug, trace};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::EnvFilter;

pub mod errors;

static LOOKING_GLASS: Emoji<'_, '_> = Emoji("🔍 ", "");
static BOOKS: Emoji<'_, '_> = Emoji("📚 ", "");
static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "");
static PAPER: Emoji<'_, '_> = Emoji("📄 ", "");
static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "");
static SUCCESS: Emoji<'_, '_> = Emoji("✨ ", "");

#[derive(Parser)]
#[command(author, version, about = "Scrape academic paper metadata from publisher search pages")]
struct Cli {
  /// Verbose mode (-v, -vv, -vvv)
  #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Increase logging verbosity"
    )]
  verbose: u8,

  /// Write logs to daily rotated files in this directory instead of the terminal
  #[arg(long, global = true)]
  log_dir: Option<PathBuf>,

  /// Skip confirmation prompts
  #[arg(long, global = true)]
  accept_defaults: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the scrape jobs of a jobs file
  Run {
    /// Jobs file: a JSON array of jobs
    jobs:          PathBuf,
    /// Directory holding the site configurations
    #[arg(long, default_value = "configs")]
    configs_dir:   PathBuf,
    /// Directory where result files are stored
    #[arg(long, short)]
    output:        Option<PathBuf>,
    /// Only run the job with this name
    #[arg(long)]
    only:          Option<String>,
    /// Download the PDF of every kept paper
    #[arg(long)]
    download_pdfs: bool,
    /// Also append the kept papers to this CSV file
    #[arg(long)]
    csv:           Option<PathBuf>,
    /// Comma separated fields to export (all by default)
    #[arg(long, value_delimiter = ',')]
    fields:        Vec<String>,
    /// Cache fetched pages below this directory
    #[arg(long)]
    cache_dir:     Option<PathBuf>,
    /// Read pages from the cache when present (`cache`) or always refetch them (`url`)
    #[arg(long, default_value = "cache", requires = "cache_dir")]
    load_from:     LoadFrom,
  },
  /// Load a site configuration and print a summary of it
  Check {
    /// Path to the site configuration
    config: PathBuf,
  },
  /// Export a result file to CSV
  Export {
    /// Path to the result file
    result:            PathBuf,
    /// CSV file to write
    #[arg(long)]
    csv:               PathBuf,
    /// Comma separated fields to export (all by default)
    #[arg(long, value_delimiter = ',')]
    fields:            Vec<String>,
    /// Rewrite the CSV file instead of appending to it
    #[arg(long = "override")]
    override_existing: bool,
  },
  /// Apply a query document to the papers of a result file
  Filter {
    /// Path to the result file
    result: PathBuf,
    /// Path to the query document
    #[arg(long, short)]
    query:  PathBuf,
    /// Store the filtered papers back into the result file
    #[arg(long)]
    write:  bool,
  },
  /// Remove all stored result files
  Clean {
    /// Directory where result files are stored
    #[arg(long, short)]
    output: Option<PathBuf>,
  },
}

/// Setup logging with the specified verbosity level, optionally into daily log files.
///
/// The returned guard flushes the log file when dropped and must live until exit.
fn setup_logging(
  verbosity: u8,
  log_dir: Option<&Path>,
) -> Result<Option<WorkerGuard>, FinderCliErrors> {
  let filter = match verbosity {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_file(true)
    .with_line_number(true)
    .with_thread_ids(true)
    .with_target(true);

  match log_dir {
    Some(dir) => {
      std::fs::create_dir_all(dir)?;
      let file_appender = rolling::RollingFileAppender::builder()
        .rotation(rolling::Rotation::DAILY)
        .filename_prefix("finder")
        .filename_suffix("log")
        .build(dir)?;
      let (writer, guard) = tracing_appender::non_blocking(file_appender);
      builder.with_ansi(false).with_writer(writer).init();
      Ok(Some(guard))
    },
    None => {
      builder.with_writer(std::io::stderr).init();
      Ok(None)
    },
  }
}

/// Where the kept papers of a job go besides the result file.
struct Outputs<'a> {
  /// Directory for the result files
  output:        &'a Path,
  /// Whether PDFs are downloaded
  download_pdfs: bool,
  /// CSV file the papers are appended to
  csv:           Option<&'a Path>,
  /// Fields exported to the CSV file
  fields:        &'a [String],
}

/// Runs one job with `fetcher`, saving its result and writing the requested outputs.
async fn run_job<F: Fetcher>(
  fetcher: F,
  site: SiteConfig,
  job: Job,
  outputs: &Outputs<'_>,
) -> Result<(), FinderCliErrors> {
  let path = ScrapeResult::file_path(outputs.output, job.config_name(), &job.name);
  let finder = Finder::new(fetcher, site, job);
  let result = finder.run().await?;
  result.save(&path)?;

  println!(
    "{} Kept {} of {} results, saved to: {}",
    style(SAVE).green(),
    style(result.total_filtered_results).yellow(),
    style(result.total_results).yellow(),
    style(path.display()).yellow()
  );

  if outputs.download_pdfs {
    let dir = path.with_file_name(format!("pdfs_{}", format::safe_filename(&finder.job().name)));
    let written = finder.download_pdfs(&result.papers, &dir).await;
    println!(
      "{} Downloaded {} PDFs to: {}",
      style(PAPER).green(),
      style(written.len()).yellow(),
      style(dir.display()).yellow()
    );
  }

  if let Some(csv) = outputs.csv {
    let count = result.export_csv(csv, outputs.fields, false)?;
    debug!("Appended {count} rows to {}", csv.display());
  }
  Ok(())
}

/// Asks for a yes/no confirmation, answering yes when prompts are skipped.
fn confirm(prompt: &str, accept_defaults: bool) -> Result<bool, FinderCliErrors> {
  if accept_defaults {
    return Ok(true);
  }
  Ok(dialoguer::Confirm::new().with_prompt(prompt).default(false).wait_for_newline(true).interact()?)
}

#[tokio::main]
async fn main() -> Result<(), FinderCliErrors> {
  let cli = Cli::parse();
  let _guard = setup_logging(cli.verbose, cli.log_dir.as_deref())?;
  let accept_defaults = cli.accept_defaults;

  match cli.command {
    Commands::Run {
      jobs,
      configs_dir,
      output,
      only,
      download_pdfs,
      csv,
      fields,
      cache_dir,
      load_from,
    } => {
      let output = output.unwrap_or_else(|| {
        let default_dir = ScrapeResult::default_dir();
        println!(
          "{} Using default output directory: {}",
          style(BOOKS).cyan(),
          style(default_dir.display()).yellow()
        );
        default_dir
      });

      let jobs = Job::load_all(&jobs)?
        .into_iter()
        .filter(|job| only.as_deref().map_or(true, |name| job.name == name))
        .collect::<Vec<_>>();
      if jobs.is_empty() {
        println!("{} No jobs to run", style(WARNING).yellow());
        return Ok(());
      }

      let outputs =
        Outputs { output: &output, download_pdfs, csv: csv.as_deref(), fields: &fields };
      for job in jobs {
        let config_path = job.site_config_path(&configs_dir);
        trace!("Using site configuration at: {}", config_path.display());
        let site = SiteConfig::from_path(&config_path)?;

        println!(
          "{} Scraping {} with {}",
          style(ROCKET).cyan(),
          style(&job.name).yellow(),
          style(job.config_name()).cyan()
        );

        match &cache_dir {
          Some(cache_dir) => {
            let dir = cache_dir.join(format::safe_filename(job.config_name()));
            let fetcher = CachedFetcher::new(HttpFetcher::new(), dir, load_from);
            run_job(fetcher, site, job, &outputs).await?;
          },
          None => run_job(HttpFetcher::new(), site, job, &outputs).await?,
        }
      }

      println!("{} All jobs finished", style(SUCCESS).green());
      Ok(())
    },

    Commands::Check { config } => {
      let site = SiteConfig::from_path(&config)?;
      let kind = |json: bool| if json { "JSON" } else { "text" };

      println!(
        "{} Site configuration is valid: {}",
        style(SUCCESS).green(),
        style(config.display()).yellow()
      );
      println!(
        "   {} {:?} {} ({})",
        style("List:").green().bold(),
        site.list.method,
        style(&site.list.url).blue().underlined(),
        kind(site.list.expect_json)
      );
      println!(
        "   {} {:?} {} ({})",
        style("Paper:").green().bold(),
        site.paper.method,
        style(&site.paper.url).blue().underlined(),
        kind(site.paper.expect_json)
      );
      println!(
        "   {} {} per page from page {}{}",
        style("Paging:").green().bold(),
        site.pagination.per_page,
        site.pagination.start_page,
        if site.pagination.offset { ", as offsets" } else { "" }
      );
      if let Some(pdf_url) = &site.pdf_url {
        println!("   {} {}", style("PDF:").green().bold(), style(pdf_url).blue().underlined());
      }
      println!("   {} {}", style("Filters:").green().bold(), site.filters.len());
      Ok(())
    },

    Commands::Export { result, csv, fields, override_existing } => {
      let stored = ScrapeResult::load(&result)?;
      let count = stored.export_csv(&csv, &fields, override_existing)?;

      if count == 0 {
        println!("{} No papers to export in: {}", style(WARNING).yellow(), style(result.display()).yellow());
      } else {
        println!(
          "{} Exported {} papers to: {}",
          style(SUCCESS).green(),
          style(count).yellow(),
          style(csv.display()).yellow()
        );
      }
      Ok(())
    },

    Commands::Filter { result, query, write } => {
      let mut stored = ScrapeResult::load(&result)?;
      let query: Query = serde_json::from_str(&std::fs::read_to_string(&query)?)?;
      query.validate()?;
      debug!("Filtering with query: {:?}", query);

      let before = stored.papers.len();
      stored.retain_matching(&query)?;

      println!(
        "{} {} of {} papers match",
        style(LOOKING_GLASS).cyan(),
        style(stored.total_filtered_results).yellow(),
        style(before).yellow()
      );
      for (i, paper) in stored.papers.iter().enumerate() {
        println!("\n{}. {}", style(i + 1).yellow(), style(&paper.title).white().bold());
        if !paper.authors.is_empty() {
          println!("   {} {}", style("Authors:").green(), style(paper.authors.join(", ")).white());
        }
      }

      if write {
        stored.save(&result)?;
        println!("\n{} Updated result file: {}", style(SAVE).green(), style(result.display()).yellow());
      }
      Ok(())
    },

    Commands::Clean { output } => {
      let output = output.unwrap_or_else(ScrapeResult::default_dir);
      let files = glob::glob(&format!("{}/*/result_*.json", output.display()))?
        .flatten()
        .collect::<Vec<_>>();

      if files.is_empty() {
        println!(
          "{} No result files found in: {}",
          style(WARNING).yellow(),
          style(output.display()).yellow()
        );
        return Ok(());
      }

      println!(
        "{} Found {} result files in: {}",
        style(WARNING).yellow(),
        style(files.len()).yellow(),
        style(output.display()).yellow()
      );

      if !confirm("Are you sure you want to delete these result files?", accept_defaults)? {
        println!("{} Operation cancelled", style("✖").red());
        return Ok(());
      }

      for file in &files {
        trace!("Removing {}", file.display());
        std::fs::remove_file(file)?;
      }
      println!("{} Result files cleaned", style(SUCCESS).green());
      Ok(())
    },
  }
}
