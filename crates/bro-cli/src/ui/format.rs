//! Formatting utilities for sizes, durations, and run summaries.

use console::Term;
use owo_colors::OwoColorize;
use std::time::Duration;

use super::colors_enabled;

/// Format file size in human-readable format.
///
/// ```
/// use bro_cli::ui::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(1024), "1.00 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Format duration in human-readable format.
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// Print the written bundles with their sizes to stderr.
pub fn print_summary(entries: &[(String, u64)], elapsed: Duration) {
    if entries.is_empty() {
        return;
    }

    let width = (Term::stderr().size().1 as usize).min(60);
    let rule = "─".repeat(width);
    let total: u64 = entries.iter().map(|(_, size)| size).sum();

    eprintln!("{}", rule);
    for (name, size) in entries {
        if colors_enabled() {
            eprintln!("  {} {} {}", "▸".blue(), name.bold(), format_size(*size).dimmed());
        } else {
            eprintln!("  ▸ {} {}", name, format_size(*size));
        }
    }
    eprintln!("{}", rule);
    eprintln!(
        "  Total: {} in {}",
        format_size(total),
        format_duration(elapsed)
    );
}
