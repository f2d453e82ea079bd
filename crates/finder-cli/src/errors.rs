//! Error types for the finder CLI application.
//!
//! This module provides a single error type that encompasses all failure modes when running
//! the CLI, including:
//! - User interaction errors
//! - Scrape, configuration and export errors from the library
//! - File system operations
//! - Query documents and result file discovery
//!
//! The errors are transparent, so the underlying error details are displayed to the user
//! unchanged.

use thiserror::Error;

/// Errors that can occur during CLI operations.
///
/// This enum wraps the error types of the dependencies and the underlying library into a
/// single error type for the CLI application.
#[derive(Error, Debug)]
pub enum FinderCliErrors {
  /// Errors from user interaction dialogs
  #[error(transparent)]
  Dialoguer(#[from] dialoguer::Error),

  /// Errors from the underlying finder library
  #[error(transparent)]
  Finder(#[from] finder::errors::FinderError),

  /// File system and IO operation errors
  #[error(transparent)]
  IO(#[from] std::io::Error),

  /// Malformed query documents
  #[error(transparent)]
  Json(#[from] serde_json::Error),

  /// Log file setup errors
  #[error(transparent)]
  LogFile(#[from] tracing_appender::rolling::InitError),

  /// Glob pattern matching errors
  #[error(transparent)]
  Glob(#[from] glob::PatternError),
}
