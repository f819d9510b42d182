//! One bundling run for one record.
//!
//! A cycle moves `Idle → Bundling → {Succeeded, Failed}`. On success the
//! concatenated output replaces the record contents and the record is either
//! forwarded or diverted to a side channel; on failure the error goes to the
//! [`ErrorRouter`] and the record is left untouched. Nothing is retried here.

use std::sync::Arc;

use bytes::BytesMut;
use futures::StreamExt;

use crate::error::BundleError;
use crate::factory::BundlerSession;
use crate::options::BroOptions;
use crate::pipeline::{Destination, SideChannel, side_channel};
use crate::record::FileRecord;
use crate::router::ErrorRouter;

/// Where a cycle's result goes.
#[derive(Debug)]
pub enum BundleOutcome {
    /// Continue down the pipeline
    Forwarded(FileRecord),
    /// Delivered through a side channel holding exactly one record
    Diverted(SideChannel),
    /// The bundler failed
    Aborted(BundleError),
}

/// Drives bundle runs for one session.
#[derive(Debug, Clone)]
pub struct BundleCycle {
    session: BundlerSession,
    options: Arc<BroOptions>,
    router: ErrorRouter,
}

impl BundleCycle {
    pub fn new(session: BundlerSession, options: Arc<BroOptions>) -> Self {
        Self {
            session,
            options,
            router: ErrorRouter,
        }
    }

    pub fn session(&self) -> &BundlerSession {
        &self.session
    }

    /// Run the bundler and attach its output to `record`.
    ///
    /// Chunks are appended in arrival order. The first error ends the run
    /// without touching `record.contents`.
    pub async fn execute(&self, record: &mut FileRecord) -> BundleOutcome {
        let mut buffer = BytesMut::new();
        let mut chunks = self.session.bundle();

        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(bytes) => buffer.extend_from_slice(&bytes),
                Err(error) => {
                    tracing::debug!(path = %record.path.display(), error = %error, "bundle failed");
                    return BundleOutcome::Aborted(error);
                }
            }
        }

        tracing::debug!(
            path = %record.path.display(),
            bytes = buffer.len(),
            "bundle completed"
        );
        record.set_contents(buffer.freeze());

        if self.options.callback.is_some() {
            let (writer, channel) = side_channel();
            // Unbounded, so filling the channel before the callback holds it
            // reads the same as pushing after.
            writer.push(record.clone());
            writer.end();
            BundleOutcome::Diverted(channel)
        } else {
            BundleOutcome::Forwarded(record.clone())
        }
    }

    /// Deliver an outcome.
    ///
    /// Returns the record when it should continue down the pipeline.
    pub fn dispatch(
        &self,
        outcome: BundleOutcome,
        destination: &Destination,
    ) -> Option<FileRecord> {
        match outcome {
            BundleOutcome::Forwarded(record) => Some(record),
            BundleOutcome::Diverted(channel) => {
                if let Some(callback) = &self.options.callback {
                    callback(channel);
                }
                None
            }
            BundleOutcome::Aborted(error) => {
                self.router.handle(error, &self.options, destination);
                None
            }
        }
    }

    /// Execute and dispatch in one step.
    pub async fn run(
        &self,
        record: &mut FileRecord,
        destination: &Destination,
    ) -> Option<FileRecord> {
        let outcome = self.execute(record).await;
        self.dispatch(outcome, destination)
    }
}
