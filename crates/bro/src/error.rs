//! Error types for bundling runs and configuration loading.
//!
//! Bundling failures are never fatal by themselves: every [`BundleError`] is
//! intercepted by the bundle cycle and routed according to the configured
//! [`ErrorStrategy`](crate::ErrorStrategy).

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Error raised by a bundler while producing a bundle.
#[derive(Debug, Error)]
pub enum BundleError {
    /// Syntax error in a bundled source file.
    #[error("{}ParseError: {message}", .file.as_ref().map(|f| format!("{}: ", f.display())).unwrap_or_default())]
    Parse {
        /// File that failed to parse, when known
        file: Option<PathBuf>,
        /// Parser message
        message: String,
    },

    /// A dependency could not be resolved.
    #[error("Cannot find module '{specifier}' from '{}'", .from.display())]
    Resolve {
        /// The specifier that failed to resolve
        specifier: String,
        /// Directory the lookup started from
        from: PathBuf,
    },

    /// The external bundler process exited unsuccessfully.
    #[error("bundler exited with {status}: {stderr}")]
    Process {
        /// Exit status of the child process
        status: ExitStatus,
        /// Captured standard error
        stderr: String,
    },

    /// I/O failure while feeding or reading the bundler.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Any other error reported by a bundler, with its own name.
    #[error("{message}")]
    Other {
        /// Error name as reported by the bundler
        name: String,
        /// Error message
        message: String,
    },
}

impl BundleError {
    /// Create a named error from a bundler adapter.
    pub fn other(name: impl Into<String>, message: impl Into<String>) -> Self {
        BundleError::Other {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Build an error from a failed bundler process.
    ///
    /// Output mentioning a parse or syntax error becomes [`BundleError::Parse`].
    pub fn from_process(status: ExitStatus, stderr: &str) -> Self {
        let stderr = stderr.trim();
        let parse_line = stderr
            .lines()
            .find(|line| line.contains("ParseError") || line.contains("SyntaxError"));

        match parse_line {
            Some(line) => {
                let message = line
                    .split_once("Error:")
                    .map(|(_, rest)| rest.trim())
                    .unwrap_or(line)
                    .to_string();
                BundleError::Parse {
                    file: None,
                    message,
                }
            }
            None => BundleError::Process {
                status,
                stderr: stderr.to_string(),
            },
        }
    }

    /// Error name, as shown in the first line of a logged error.
    pub fn name(&self) -> &str {
        match self {
            BundleError::Parse { .. } => "SyntaxError",
            BundleError::Resolve { .. } => "ResolveError",
            BundleError::Process { .. } => "BundlerError",
            BundleError::Io(_) => "IoError",
            BundleError::Other { name, .. } => name,
        }
    }

    /// True for syntax errors in bundled sources.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, BundleError::Parse { .. })
    }
}

impl miette::Diagnostic for BundleError {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            BundleError::Parse { .. } => "PARSE_ERROR",
            BundleError::Resolve { .. } => "RESOLVE_ERROR",
            BundleError::Process { .. } => "BUNDLER_PROCESS_ERROR",
            BundleError::Io(_) => "IO_ERROR",
            BundleError::Other { .. } => "BUNDLER_ERROR",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            BundleError::Parse { .. } => Some(Box::new(
                "Fix the syntax error in the bundled source; watch mode rebundles on save."
                    .to_string(),
            )),
            BundleError::Resolve { specifier, .. } => Some(Box::new(format!(
                "Check that '{}' is installed or that the relative path is correct.",
                specifier
            ))),
            BundleError::Process { .. } => Some(Box::new(
                "Run the bundler command by hand to see its full output.".to_string(),
            )),
            _ => None,
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::InvalidValue(err.to_string())
    }
}

/// Result type alias for configuration loading.
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn failed_status() -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(1 << 8)
    }

    #[test]
    fn test_parse_error_display() {
        let err = BundleError::Parse {
            file: Some(PathBuf::from("/src/a.js")),
            message: "Unexpected token (1:7)".to_string(),
        };
        assert_eq!(err.to_string(), "/src/a.js: ParseError: Unexpected token (1:7)");
        assert_eq!(err.name(), "SyntaxError");
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_parse_error_without_file() {
        let err = BundleError::Parse {
            file: None,
            message: "Unexpected token".to_string(),
        };
        assert_eq!(err.to_string(), "ParseError: Unexpected token");
    }

    #[test]
    fn test_other_error_keeps_name() {
        let err = BundleError::other("TypeError", "boom");
        assert_eq!(err.name(), "TypeError");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_resolve_error_display() {
        let err = BundleError::Resolve {
            specifier: "./x".to_string(),
            from: PathBuf::from("/src"),
        };
        assert_eq!(err.to_string(), "Cannot find module './x' from '/src'");
    }

    #[cfg(unix)]
    #[test]
    fn test_from_process_detects_parse_error() {
        let err = BundleError::from_process(
            failed_status(),
            "/src/a.js:1\nParseError: Unexpected token\n",
        );
        assert!(err.is_parse_error());
        assert_eq!(err.to_string(), "ParseError: Unexpected token");
    }

    #[cfg(unix)]
    #[test]
    fn test_from_process_generic_failure() {
        let err = BundleError::from_process(failed_status(), "out of memory\n");
        assert_eq!(err.name(), "BundlerError");
        assert!(err.to_string().contains("out of memory"));
    }

    #[test]
    fn test_config_error_from_figment() {
        let err: ConfigError = figment::Error::from("bad value".to_string()).into();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }
}
