//! The pipeline stage: record in, bundle out.
//!
//! Records are taken one at a time. Each gets its own bundler session and one
//! bundle cycle whose result completes the record for the pipeline. In watch
//! mode the session outlives that first cycle: a background task re-runs the
//! cycle on every dependency update and pushes the refreshed record to the
//! destination, without completing the record a second time.
//!
//! A record bundled from memory is re-read from disk when its own file
//! changes, so the next cycle sees the saved content.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bundler::BundlerFactory;
use crate::cycle::BundleCycle;
use crate::factory::{BundlerSession, bundler_input, create_session};
use crate::options::{BroArgs, BroOptions};
use crate::pipeline::{Destination, PipelineEvent};
use crate::record::FileRecord;
use crate::router;
use crate::watch::{SessionEvent, SessionEvents};

/// Create a stage bundling every record with bundlers from `factory`.
pub fn bro<F>(factory: F, args: impl Into<BroArgs>) -> BroStage
where
    F: BundlerFactory + 'static,
{
    BroStage::new(Arc::new(factory), args.into().into_options())
}

/// Record-by-record bundling transform.
pub struct BroStage {
    options: Arc<BroOptions>,
    factory: Arc<dyn BundlerFactory>,
    watchers: Vec<WatchHandle>,
}

impl BroStage {
    pub fn new(factory: Arc<dyn BundlerFactory>, options: BroOptions) -> Self {
        Self {
            options: Arc::new(options),
            factory,
            watchers: Vec::new(),
        }
    }

    pub fn options(&self) -> &BroOptions {
        &self.options
    }

    /// Bundle one record.
    ///
    /// Returns the bundled record when it should continue downstream; `None`
    /// when it was diverted to a side channel or its bundle failed. Either way
    /// the record is complete for the pipeline once this returns.
    ///
    /// Must be called from within a Tokio runtime when watching.
    pub async fn transform(
        &mut self,
        record: FileRecord,
        destination: &Destination,
    ) -> Option<FileRecord> {
        let session = create_session(self.factory.as_ref(), &self.options, &record);
        let reload = (!record.is_null()).then(|| self.factory.clone());
        let cycle = BundleCycle::new(session.clone(), self.options.clone());
        let events = session.take_events();

        let mut record = record;
        let completed = cycle.run(&mut record, destination).await;

        if let Some(events) = events {
            tracing::debug!(path = %record.path.display(), "watching for changes");
            let task = tokio::spawn(watch_loop(
                cycle,
                events,
                record,
                reload,
                destination.clone(),
                self.options.clone(),
            ));
            self.watchers.push(WatchHandle { session, task });
        }

        completed
    }

    /// Run the stage over `upstream` in a background task.
    ///
    /// Records are processed in arrival order, each completing before the next
    /// is taken. The returned receiver observes every pipeline event; it closes
    /// once upstream is exhausted and no watch session is left running. The
    /// task hands the stage back so its watchers can be disposed.
    pub fn pipe<S>(
        mut self,
        upstream: S,
    ) -> (mpsc::UnboundedReceiver<PipelineEvent>, JoinHandle<BroStage>)
    where
        S: Stream<Item = FileRecord> + Send + 'static,
    {
        let (destination, rx) = Destination::channel();

        let task = tokio::spawn(async move {
            let mut upstream = Box::pin(upstream);
            while let Some(record) = upstream.next().await {
                if let Some(bundled) = self.transform(record, &destination).await {
                    destination.push(bundled);
                }
            }
            tracing::debug!(watchers = self.watchers.len(), "upstream exhausted");
            self
        });

        (rx, task)
    }

    /// Handles of the sessions still watching.
    pub fn watchers(&self) -> &[WatchHandle] {
        &self.watchers
    }

    /// Stop every watch session started by this stage.
    pub fn dispose(&mut self) {
        for handle in self.watchers.drain(..) {
            handle.dispose();
        }
    }
}

impl std::fmt::Debug for BroStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroStage")
            .field("options", &self.options)
            .field("watchers", &self.watchers.len())
            .finish_non_exhaustive()
    }
}

/// A running watch session.
///
/// Dropping the handle leaves the session running; call [`WatchHandle::dispose`]
/// to stop it.
#[derive(Debug)]
pub struct WatchHandle {
    session: BundlerSession,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn session(&self) -> &BundlerSession {
        &self.session
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Close the watcher and stop the rebundle task.
    pub fn dispose(self) {
        self.session.dispose();
        self.task.abort();
    }
}

/// Re-run `cycle` on every update until the session closes.
///
/// `reload` is set for records bundled from memory: an update naming the
/// record's own file rebinds the session to the content now on disk.
async fn watch_loop(
    cycle: BundleCycle,
    mut events: SessionEvents,
    mut record: FileRecord,
    reload: Option<Arc<dyn BundlerFactory>>,
    destination: Destination,
    options: Arc<BroOptions>,
) {
    let entry = match &reload {
        Some(_) => Some(
            tokio::fs::canonicalize(&record.path)
                .await
                .unwrap_or_else(|_| record.path.clone()),
        ),
        None => None,
    };

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Update(paths) => {
                tracing::debug!(
                    path = %record.path.display(),
                    changed = paths.len(),
                    "dependency changed, rebundling"
                );
                if let (Some(factory), Some(entry)) = (&reload, &entry) {
                    if paths.iter().any(|path| path == entry) {
                        reload_entry(cycle.session(), factory.as_ref(), &record).await;
                    }
                }
                if let Some(bundled) = cycle.run(&mut record, &destination).await {
                    destination.push(bundled);
                }
            }
            SessionEvent::Log(message) => router::log(&options, &message),
        }
    }
    tracing::debug!(path = %record.path.display(), "watch session ended");
}

/// Rebind `session` to the current on-disk content of `record`'s file.
async fn reload_entry(session: &BundlerSession, factory: &dyn BundlerFactory, record: &FileRecord) {
    match tokio::fs::read(&record.path).await {
        Ok(contents) => {
            let source = FileRecord::with_contents(record.path.clone(), record.base.clone(), contents);
            session.rebind(factory.create(bundler_input(&source)));
        }
        Err(e) => {
            tracing::debug!(
                path = %record.path.display(),
                error = %e,
                "cannot re-read entry, keeping previous content"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{Bundler, BundlerInput, ChunkStream};
    use crate::sink::MemorySink;
    use bytes::Bytes;
    use futures::stream;

    struct Echo;

    impl Bundler for Echo {
        fn bundle(&self) -> ChunkStream {
            Box::pin(stream::iter(vec![Ok(Bytes::from_static(b"bundled"))]))
        }
    }

    fn echo_factory(_: BundlerInput) -> Arc<dyn Bundler> {
        Arc::new(Echo)
    }

    #[tokio::test]
    async fn test_transform_forwards_record() {
        let mut stage = bro(echo_factory, BroOptions::new());
        let (destination, _rx) = Destination::channel();

        let record = FileRecord::from_path("/src/a.js", "/src");
        let bundled = stage.transform(record, &destination).await.expect("forwarded");

        assert_eq!(bundled.contents_bytes(), b"bundled");
        assert!(stage.watchers().is_empty());
    }

    #[tokio::test]
    async fn test_pipe_preserves_arrival_order() {
        let stage = bro(echo_factory, BroOptions::new());
        let records = vec![
            FileRecord::from_path("/src/a.js", "/src"),
            FileRecord::from_path("/src/b.js", "/src"),
            FileRecord::from_path("/src/c.js", "/src"),
        ];

        let (mut rx, task) = stage.pipe(stream::iter(records));
        let mut paths = Vec::new();
        while let Some(event) = rx.recv().await {
            if let PipelineEvent::Record(record) = event {
                paths.push(record.path);
            }
        }
        task.await.unwrap();

        let expected: Vec<std::path::PathBuf> = ["/src/a.js", "/src/b.js", "/src/c.js"]
            .iter()
            .map(Into::into)
            .collect();
        assert_eq!(paths, expected);
    }

    #[tokio::test]
    async fn test_watch_log_events_reach_sink() {
        let sink = MemorySink::new();
        let options = BroOptions::new().watch(true).color(false).log_sink(sink.clone());
        let mut stage = bro(echo_factory, options);
        let (destination, _rx) = Destination::channel();

        stage
            .transform(FileRecord::from_path("/src/a.js", "/src"), &destination)
            .await;
        let notifier = stage.watchers()[0].session().notifier().unwrap();
        notifier.log("custom message");

        for _ in 0..50 {
            if sink
                .messages()
                .iter()
                .any(|m| m == "[bro] custom message")
            {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(sink.messages().iter().any(|m| m.starts_with("[bro] 7 bytes written")));
        assert!(sink.messages().iter().any(|m| m == "[bro] custom message"));

        stage.dispose();
        assert!(stage.watchers().is_empty());
    }
}
