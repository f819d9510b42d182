//! Error routing for failed bundle runs.
//!
//! A failed run is handled by exactly one [`ErrorStrategy`]. Whatever the
//! strategy, the destination then receives an end-of-stream signal and a
//! configured callback receives an empty, already-ended side channel, so that
//! neither side is left waiting for a record that will never come.

use std::sync::LazyLock;

use owo_colors::OwoColorize;
use regex::Regex;

use crate::error::BundleError;
use crate::options::{BroOptions, ErrorStrategy};
use crate::pipeline::{Destination, side_channel};

static PARSE_ERROR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(ParseError.*)").expect("valid parse error pattern"));

/// Routes bundling errors according to the stage options.
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorRouter;

impl ErrorRouter {
    pub fn handle(&self, error: BundleError, options: &BroOptions, destination: &Destination) {
        tracing::debug!(error_name = error.name(), "routing bundle error");

        match &options.error {
            ErrorStrategy::Log => {
                let message = format_error(&error, options.color);
                log(options, &message);
            }
            ErrorStrategy::Emit => destination.emit_error(error),
            ErrorStrategy::Custom(handler) => handler(error),
        }

        destination.end();

        if let Some(callback) = &options.callback {
            let (writer, channel) = side_channel();
            writer.end();
            callback(channel);
        }
    }
}

/// Format an error as `<name>\n<error string>`.
///
/// The first `ParseError…` span of the error string is highlighted.
pub fn format_error(error: &BundleError, color: bool) -> String {
    let text = error.to_string();
    if color {
        let highlighted = PARSE_ERROR.replace(&text, |caps: &regex::Captures<'_>| {
            let span: &str = &caps[1];
            span.red().to_string()
        });
        format!("{}\n{}", error.name().red(), highlighted)
    } else {
        format!("{}\n{}", error.name(), text)
    }
}

/// Prefix a message with the `[bro]` tag.
pub fn format_log_line(message: &str, color: bool) -> String {
    if color {
        format!("[{}] {}", "bro".cyan(), message)
    } else {
        format!("[bro] {}", message)
    }
}

/// Write a tagged message to the configured log sink.
pub fn log(options: &BroOptions, message: &str) {
    options
        .log_sink
        .log(&format_log_line(message, options.color));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineEvent;
    use crate::sink::MemorySink;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn parse_error() -> BundleError {
        BundleError::Parse {
            file: Some(PathBuf::from("/src/a.js")),
            message: "Unexpected token".to_string(),
        }
    }

    #[test]
    fn test_format_error_plain() {
        let message = format_error(&parse_error(), false);
        assert_eq!(message, "SyntaxError\n/src/a.js: ParseError: Unexpected token");
    }

    #[test]
    fn test_format_error_highlights_parse_error() {
        let message = format_error(&parse_error(), true);
        let highlighted = "ParseError: Unexpected token".red().to_string();
        assert!(message.contains(&highlighted));
        assert!(message.contains("/src/a.js: "));
    }

    #[test]
    fn test_format_log_line() {
        assert_eq!(format_log_line("hello", false), "[bro] hello");
        assert!(format_log_line("hello", true).contains(&"bro".cyan().to_string()));
    }

    #[tokio::test]
    async fn test_log_strategy() {
        let sink = MemorySink::new();
        let options = BroOptions::new().color(false).log_sink(sink.clone());
        let (destination, mut rx) = Destination::channel();

        ErrorRouter.handle(parse_error(), &options, &destination);
        drop(destination);

        assert_eq!(sink.len(), 1);
        assert!(sink.messages()[0].starts_with("[bro] SyntaxError\n"));
        assert!(matches!(rx.recv().await, Some(PipelineEvent::End)));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_emit_strategy() {
        let sink = MemorySink::new();
        let options = BroOptions::new()
            .error(ErrorStrategy::Emit)
            .log_sink(sink.clone());
        let (destination, mut rx) = Destination::channel();

        ErrorRouter.handle(parse_error(), &options, &destination);

        assert!(sink.is_empty());
        assert!(matches!(rx.recv().await, Some(PipelineEvent::Error(e)) if e.is_parse_error()));
        assert!(matches!(rx.recv().await, Some(PipelineEvent::End)));
    }

    #[tokio::test]
    async fn test_custom_strategy() {
        let sink = MemorySink::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let options = BroOptions::new()
            .on_error(move |e| captured.lock().push(e.name().to_string()))
            .log_sink(sink.clone());
        let (destination, mut rx) = Destination::channel();

        ErrorRouter.handle(parse_error(), &options, &destination);

        assert_eq!(*seen.lock(), vec!["SyntaxError".to_string()]);
        assert!(sink.is_empty());
        assert!(matches!(rx.recv().await, Some(PipelineEvent::End)));
    }

    #[tokio::test]
    async fn test_callback_receives_empty_channel() {
        let channels = Arc::new(Mutex::new(Vec::new()));
        let captured = channels.clone();
        let options = BroOptions::new()
            .color(false)
            .log_sink(MemorySink::new())
            .callback(move |channel| captured.lock().push(channel));
        let (destination, _rx) = Destination::channel();

        ErrorRouter.handle(parse_error(), &options, &destination);

        let channel = channels.lock().pop().expect("callback invoked");
        assert!(channels.lock().is_empty());
        assert!(channel.collect_all().await.is_empty());
    }
}
