//! Bro CLI - bundle files through an external module bundler.
//!
//! The binary wires the `bro` stage to the file system: entry files become
//! records, records go through the bundler command, and bundled records are
//! written under the output directory.
//!
//! - [`cli`] - Argument definitions
//! - [`bundle`] - The bundle run, including watch mode
//! - [`error`] - Error types and miette conversion
//! - [`logger`] - Tracing subscriber setup
//! - [`ui`] - Status lines and summaries

pub mod bundle;
pub mod cli;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, Result, ResultExt};
