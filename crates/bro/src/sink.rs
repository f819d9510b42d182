//! The process-wide logging channel for formatted bro messages.

use parking_lot::Mutex;
use std::sync::Arc;

/// Destination for formatted, human-readable log lines.
pub trait LogSink: Send + Sync {
    /// Write one message.
    fn log(&self, message: &str);
}

/// Default sink: emits every message as a `tracing` info event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, message: &str) {
        tracing::info!(target: "bro", "{}", message);
    }
}

/// Sink that keeps messages in memory.
///
/// Useful for hosts that render messages themselves, and for tests.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    messages: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every message logged so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

impl LogSink for MemorySink {
    fn log(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}
