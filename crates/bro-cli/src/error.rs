//! Error handling for the bro CLI.
//!
//! Library errors convert into [`CliError`] through `#[from]`, and
//! [`cli_error_to_miette`] turns the final error into a report for `main`.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file or environment could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] bro::ConfigError),

    /// A bundle failed and the error strategy asked to fail the run
    #[error("{0}")]
    Bundle(#[from] bro::BundleError),

    /// Invalid command-line arguments or options
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Entry file not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// I/O errors from file system operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with custom messages
    #[error("{0}")]
    Custom(String),
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Turn a not-found I/O error into [`CliError::FileNotFound`] for `path`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    /// Prefix the error with a message.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            match err {
                CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                    CliError::FileNotFound(path.as_ref().to_path_buf())
                }
                other => other,
            }
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}: {}", msg, err))
        })
    }
}

/// Convert CliError to miette Report
pub fn cli_error_to_miette(err: CliError) -> miette::Report {
    match err {
        CliError::Bundle(e) => miette::Report::new(e),
        CliError::Config(e) => miette::miette!(
            help = "Check bro.toml / bro.json and the BRO_* environment variables",
            "Configuration error: {}",
            e
        ),
        CliError::FileNotFound(path) => miette::miette!(
            help = "Entry paths are resolved from the working directory (--cwd)",
            "File not found: {}",
            path.display()
        ),
        _ => miette::miette!("{}", err),
    }
}
