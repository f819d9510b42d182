//! Terminal output for the bro CLI.
//!
//! Status lines go to stderr, next to the tracing output.
//!
//! ```no_run
//! use bro_cli::ui;
//!
//! ui::init_colors(true);
//! ui::success("Bundled src/main.js");
//! ui::error("Failed to write dist/main.js");
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

mod format;
mod messages;

pub use format::{format_duration, format_size, print_summary};
pub use messages::{error, info, success, warning};

static COLORS: AtomicBool = AtomicBool::new(true);

/// Enable or disable colors for every status line.
pub fn init_colors(enabled: bool) {
    COLORS.store(enabled, Ordering::Relaxed);
}

pub(crate) fn colors_enabled() -> bool {
    COLORS.load(Ordering::Relaxed)
}

/// Check if color output should be enabled.
///
/// `--no-color` always wins; otherwise NO_COLOR, FORCE_COLOR and terminal
/// detection decide.
pub fn should_use_color(no_color: bool) -> bool {
    !no_color && bro::options::should_use_color()
}
