//! Logging infrastructure for the bro CLI.
//!
//! Bundle messages from the library arrive as `tracing` events with the `bro`
//! target, so the verbosity flags decide whether they are shown at all. All
//! output goes to stderr.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified options.
///
/// The logging level is determined in this order:
/// 1. `--verbose` flag: DEBUG for bro crates
/// 2. `--quiet` flag: ERROR only
/// 3. `RUST_LOG` environment variable
/// 4. Default: INFO for bro crates
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let filter = filter_for(verbose, quiet);

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(!is_default_level(verbose, quiet))
        .with_ansi(!no_color)
        .without_time()
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("bro=debug,bro_cli=debug")
    } else if quiet {
        EnvFilter::new("bro=error,bro_cli=error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bro=info,bro_cli=info"))
    }
}

// At the default level every line is a `[bro] ...` message; the level tag is noise.
fn is_default_level(verbose: bool, quiet: bool) -> bool {
    !verbose && !quiet
}
