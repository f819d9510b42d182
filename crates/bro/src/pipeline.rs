//! Downstream plumbing: the pipeline destination and side channels.
//!
//! The stage forwards bundled records to a [`Destination`]. When a caller asks
//! to intercept output, records go to a freshly created [`SideChannel`]
//! instead, which is closed as soon as its single record has been written.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::error::BundleError;
use crate::record::FileRecord;

/// Event observed by whatever consumes the stage output.
#[derive(Debug)]
pub enum PipelineEvent {
    /// A bundled record forwarded downstream
    Record(FileRecord),
    /// A bundling error re-raised on the pipeline (`ErrorStrategy::Emit`)
    Error(BundleError),
    /// Forced end-of-stream after error handling
    End,
}

/// Cloneable handle to the downstream side of the pipeline.
#[derive(Debug, Clone)]
pub struct Destination {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl Destination {
    /// Create a destination together with the receiver that observes it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Forward a record downstream.
    pub fn push(&self, record: FileRecord) {
        self.send(PipelineEvent::Record(record));
    }

    /// Raise an error on the pipeline's own error channel.
    pub fn emit_error(&self, error: BundleError) {
        self.send(PipelineEvent::Error(error));
    }

    /// Signal end-of-stream for the current record.
    pub fn end(&self) {
        self.send(PipelineEvent::End);
    }

    /// True once the consumer has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, event: PipelineEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("pipeline consumer dropped, discarding event");
        }
    }
}

/// Create a side channel, returning its writer and reader halves.
pub fn side_channel() -> (SideChannelWriter, SideChannel) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SideChannelWriter { tx }, SideChannel { rx })
}

/// Writing half of a side channel. Dropping it ends the channel.
#[derive(Debug)]
pub struct SideChannelWriter {
    tx: mpsc::UnboundedSender<FileRecord>,
}

impl SideChannelWriter {
    /// Push a record into the channel.
    pub fn push(&self, record: FileRecord) {
        if self.tx.send(record).is_err() {
            tracing::debug!("side channel reader dropped, discarding record");
        }
    }

    /// Signal end-of-channel.
    pub fn end(self) {}
}

/// Reading half of a side channel handed to the caller's callback.
///
/// Yields the diverted records, then `None` once the channel has ended.
#[derive(Debug)]
pub struct SideChannel {
    rx: mpsc::UnboundedReceiver<FileRecord>,
}

impl SideChannel {
    /// Receive the next record, `None` at end-of-channel.
    pub async fn recv(&mut self) -> Option<FileRecord> {
        self.rx.recv().await
    }

    /// Receive without waiting.
    ///
    /// Returns `None` when nothing is buffered, whether or not the channel ended.
    pub fn try_recv(&mut self) -> Option<FileRecord> {
        self.rx.try_recv().ok()
    }

    /// Drain every record until end-of-channel.
    pub async fn collect_all(mut self) -> Vec<FileRecord> {
        let mut records = Vec::new();
        while let Some(record) = self.rx.recv().await {
            records.push(record);
        }
        records
    }
}

impl Stream for SideChannel {
    type Item = FileRecord;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
