//! Bundler construction for file records.

use std::sync::Arc;

use crate::bundler::{Bundler, BundlerFactory, BundlerInput, ChunkStream, Entry, EntrySource};
use crate::options::BroOptions;
use crate::record::FileRecord;
use crate::watch::{SessionEvents, SessionNotifier, WatchBundler};

/// Bundler bound to one record, ready to run.
#[derive(Clone)]
pub enum BundlerSession {
    /// Runs once per record
    Plain(Arc<dyn Bundler>),
    /// Long-lived, rebundles on dependency change
    Watching(Arc<WatchBundler>),
}

impl BundlerSession {
    /// Start one bundling run.
    pub fn bundle(&self) -> ChunkStream {
        match self {
            BundlerSession::Plain(bundler) => bundler.bundle(),
            BundlerSession::Watching(bundler) => bundler.bundle(),
        }
    }

    pub fn is_watching(&self) -> bool {
        matches!(self, BundlerSession::Watching(_))
    }

    /// Take the watch event receiver; `None` for plain sessions.
    pub fn take_events(&self) -> Option<SessionEvents> {
        match self {
            BundlerSession::Plain(_) => None,
            BundlerSession::Watching(bundler) => bundler.take_events(),
        }
    }

    pub fn notifier(&self) -> Option<SessionNotifier> {
        match self {
            BundlerSession::Plain(_) => None,
            BundlerSession::Watching(bundler) => Some(bundler.notifier()),
        }
    }

    /// Use `bundler` for later runs of a watching session.
    ///
    /// Plain sessions run once, so this is a no-op for them.
    pub fn rebind(&self, bundler: Arc<dyn Bundler>) {
        if let BundlerSession::Watching(watching) = self {
            watching.replace_inner(bundler);
        }
    }

    /// Release the file watcher, if any.
    pub fn dispose(&self) {
        if let BundlerSession::Watching(bundler) = self {
            bundler.close();
        }
    }
}

impl std::fmt::Debug for BundlerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BundlerSession::Plain(_) => write!(f, "BundlerSession::Plain"),
            BundlerSession::Watching(_) => write!(f, "BundlerSession::Watching"),
        }
    }
}

/// Bundler input for a record.
///
/// Null records bundle from their path with no base directory override.
/// Records with content are streamed from memory and resolve relative
/// dependencies from the record's base directory.
pub fn bundler_input(record: &FileRecord) -> BundlerInput {
    match &record.contents {
        None => BundlerInput {
            entry: Entry::Path(record.path.clone()),
            basedir: None,
        },
        Some(contents) => BundlerInput {
            entry: Entry::Source(EntrySource::new(contents.clone())),
            basedir: Some(record.base.clone()),
        },
    }
}

/// Create an unstarted session for `record`.
pub fn create_session(
    factory: &dyn BundlerFactory,
    options: &BroOptions,
    record: &FileRecord,
) -> BundlerSession {
    // In-memory entries still have a file behind them; saving it rebundles.
    let watched_entry = record.path.clone();
    let bundler = factory.create(bundler_input(record));

    if options.watch {
        tracing::debug!(path = %record.path.display(), "creating watching session");
        BundlerSession::Watching(Arc::new(WatchBundler::new(
            bundler,
            Some(watched_entry),
            options.debounce,
        )))
    } else {
        BundlerSession::Plain(bundler)
    }
}
