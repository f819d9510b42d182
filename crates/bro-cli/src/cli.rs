//! Command-line interface definition for bro.
//!
//! `bro` takes a list of entry files and a bundler command line, runs every
//! entry through the bundler and writes the results under an output directory.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Bro - bundle files through an external module bundler
#[derive(Parser, Debug)]
#[command(
    name = "bro",
    version,
    about = "Bundle files through an external module bundler",
    long_about = "Bro feeds each entry file to a module bundler command and writes the\n\
                  bundled output under the output directory. With --watch, every entry\n\
                  is rebundled when it changes or when a path given with --watch-path\n\
                  changes."
)]
pub struct Cli {
    /// Entry files to bundle
    ///
    /// Examples:
    ///   bro -b "esbuild --bundle {entry}" src/main.js
    ///   bro -b "browserify -" --read src/app.js src/worker.js
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Bundler command line
    ///
    /// `{entry}` is replaced by the entry path, or by `-` when the entry is
    /// piped through stdin (--read). Without a placeholder the entry path is
    /// appended. The command's stdout is the bundle.
    #[arg(short, long, value_name = "COMMAND")]
    pub bundler: String,

    /// Output directory for bundled files
    #[arg(short = 'd', long, default_value = "dist", value_name = "DIR")]
    pub out_dir: PathBuf,

    /// Base directory entries are placed relative to in the output
    ///
    /// Defaults to the working directory.
    #[arg(long, value_name = "DIR")]
    pub base: Option<PathBuf>,

    /// Read entries into memory and pipe them to the bundler
    ///
    /// The bundler then runs in the base directory so relative imports
    /// resolve as they would from the entry file.
    #[arg(short, long)]
    pub read: bool,

    /// Rebundle when an entry or a --watch-path changes
    #[arg(short, long)]
    pub watch: bool,

    /// File or directory the bundles depend on, watched with --watch
    ///
    /// The bundler is an external program, so bro only knows about the entry
    /// itself. Directories are watched recursively. Repeatable.
    #[arg(long = "watch-path", value_name = "PATH")]
    pub watch_paths: Vec<PathBuf>,

    /// How bundling errors are handled
    #[arg(short, long, value_enum, value_name = "STRATEGY")]
    pub error: Option<ErrorMode>,

    /// Path to a bro.toml or bro.json config file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Working directory
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Error strategies selectable from the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
    /// Print the error and keep going
    Log,
    /// Fail the run
    Emit,
}

impl From<ErrorMode> for bro::ErrorStrategy {
    fn from(mode: ErrorMode) -> Self {
        match mode {
            ErrorMode::Log => bro::ErrorStrategy::Log,
            ErrorMode::Emit => bro::ErrorStrategy::Emit,
        }
    }
}
