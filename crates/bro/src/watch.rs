//! Watch-capable bundler decorator.
//!
//! [`WatchBundler`] keeps the [`Bundler`] contract of the bundler it wraps and
//! adds a [`SessionEvent`] channel. After every run it registers the entry and
//! the reported dependencies with a file system watcher; changes to any of them
//! are debounced per path and surface as [`SessionEvent::Update`].
//!
//! Files are watched through their parent directory and events are filtered
//! down to the tracked files. A watch on the file itself would be lost when an
//! editor saves by renaming a temporary file over it. Dependencies that are
//! directories are watched recursively and match any path below them.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use futures::StreamExt;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::bundler::{Bundler, ChunkStream};

/// Notification emitted by a watching session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// One or more dependencies changed
    Update(Vec<PathBuf>),
    /// Informational message about the last run
    Log(String),
}

/// Receiver for a session's events.
pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

/// Paths whose changes trigger an update.
#[derive(Debug, Default)]
struct Targets {
    files: HashSet<PathBuf>,
    trees: HashSet<PathBuf>,
}

impl Targets {
    fn matches(&self, path: &Path) -> bool {
        self.files.contains(path) || self.trees.iter().any(|tree| path.starts_with(tree))
    }

    fn insert(&mut self, target: WatchTarget) {
        match target.mode {
            RecursiveMode::Recursive => self.trees.insert(target.tracked),
            RecursiveMode::NonRecursive => self.files.insert(target.tracked),
        };
    }
}

/// A tracked path and the directory registration that reports its changes.
#[derive(Debug, Clone, PartialEq, Eq)]
struct WatchTarget {
    tracked: PathBuf,
    dir: PathBuf,
    mode: RecursiveMode,
}

impl WatchTarget {
    /// Resolve `path` against the file system.
    ///
    /// Directories are watched recursively. Anything else is tracked as a file
    /// of its parent directory, which must exist; the file itself may not yet.
    /// Paths are canonicalized so they compare equal to what the watcher reports.
    fn resolve(path: &Path) -> Option<Self> {
        if path.is_dir() {
            let dir = path.canonicalize().ok()?;
            return Some(Self {
                tracked: dir.clone(),
                dir,
                mode: RecursiveMode::Recursive,
            });
        }

        let name = path.file_name()?;
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let dir = parent.canonicalize().ok()?;
        Some(Self {
            tracked: dir.join(name),
            dir,
            mode: RecursiveMode::NonRecursive,
        })
    }
}

struct WatchState {
    tx: Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>,
    rx: Mutex<Option<SessionEvents>>,
    watcher: Mutex<Option<RecommendedWatcher>>,
    // Directories registered with the watcher. Only touched under `watcher`.
    dirs: Mutex<HashMap<PathBuf, RecursiveMode>>,
    // Read by the watcher callback; never held across a `watch` call.
    targets: Mutex<Targets>,
    debounce: Duration,
}

impl WatchState {
    fn send(&self, event: SessionEvent) -> bool {
        match self.tx.lock().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    fn is_closed(&self) -> bool {
        self.tx.lock().is_none()
    }

    /// Track `paths`, registering their directories with the watcher and
    /// creating the watcher on first use.
    fn watch_paths(self: &Arc<Self>, paths: impl IntoIterator<Item = PathBuf>) {
        if self.is_closed() {
            return;
        }

        let mut watcher = self.watcher.lock();
        if watcher.is_none() {
            match self.create_watcher() {
                Ok(created) => *watcher = Some(created),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to create file watcher");
                    return;
                }
            }
        }
        let Some(watcher) = watcher.as_mut() else {
            return;
        };

        let mut dirs = self.dirs.lock();
        let mut ready = Vec::new();
        for path in paths {
            let Some(target) = WatchTarget::resolve(&path) else {
                tracing::debug!(path = %path.display(), "cannot watch path");
                continue;
            };

            let covered = match dirs.get(&target.dir) {
                Some(RecursiveMode::Recursive) => true,
                Some(RecursiveMode::NonRecursive) => target.mode == RecursiveMode::NonRecursive,
                None => false,
            };
            if !covered {
                if let Err(e) = watcher.watch(&target.dir, target.mode) {
                    tracing::debug!(path = %target.dir.display(), error = %e, "cannot watch directory");
                    continue;
                }
                tracing::trace!(path = %target.dir.display(), "watching directory");
                dirs.insert(target.dir.clone(), target.mode);
            }
            ready.push(target);
        }
        drop(dirs);

        let mut targets = self.targets.lock();
        for target in ready {
            targets.insert(target);
        }
    }

    fn create_watcher(self: &Arc<Self>) -> notify::Result<RecommendedWatcher> {
        let state: Weak<WatchState> = Arc::downgrade(self);
        let debounce = self.debounce;
        let mut last_seen: HashMap<PathBuf, Instant> = HashMap::new();

        notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "file watcher error");
                    return;
                }
            };

            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                return;
            }

            let Some(state) = state.upgrade() else {
                return;
            };

            let now = Instant::now();
            let changed: Vec<PathBuf> = {
                let targets = state.targets.lock();
                event
                    .paths
                    .into_iter()
                    .filter(|path| targets.matches(path))
                    .filter(|path| should_emit(&mut last_seen, path, now, debounce))
                    .collect()
            };

            if !changed.is_empty() {
                state.send(SessionEvent::Update(changed));
            }
        })
    }
}

/// Debounce check: skip a path that already fired within `debounce`.
fn should_emit(
    last_seen: &mut HashMap<PathBuf, Instant>,
    path: &Path,
    now: Instant,
    debounce: Duration,
) -> bool {
    if let Some(last) = last_seen.get(path) {
        if now.duration_since(*last) < debounce {
            return false;
        }
    }
    last_seen.insert(path.to_path_buf(), now);
    true
}

/// Handle for injecting events into a watching session.
#[derive(Clone)]
pub struct SessionNotifier {
    state: Arc<WatchState>,
}

impl SessionNotifier {
    /// Report changed dependencies. Returns `false` once the session is closed.
    pub fn update(&self, paths: Vec<PathBuf>) -> bool {
        self.state.send(SessionEvent::Update(paths))
    }

    /// Report an informational message.
    pub fn log(&self, message: impl Into<String>) -> bool {
        self.state.send(SessionEvent::Log(message.into()))
    }
}

/// Bundler decorator that rebundles on dependency change.
pub struct WatchBundler {
    inner: Mutex<Arc<dyn Bundler>>,
    entry: Option<PathBuf>,
    state: Arc<WatchState>,
}

impl WatchBundler {
    /// Wrap `inner`. `entry` is watched alongside reported dependencies.
    pub fn new(inner: Arc<dyn Bundler>, entry: Option<PathBuf>, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Mutex::new(inner),
            entry,
            state: Arc::new(WatchState {
                tx: Mutex::new(Some(tx)),
                rx: Mutex::new(Some(rx)),
                watcher: Mutex::new(None),
                dirs: Mutex::new(HashMap::new()),
                targets: Mutex::new(Targets::default()),
                debounce,
            }),
        }
    }

    /// Swap the wrapped bundler; the next run uses `inner`.
    pub fn replace_inner(&self, inner: Arc<dyn Bundler>) {
        *self.inner.lock() = inner;
    }

    /// Take the event receiver. Only the first call returns `Some`.
    pub fn take_events(&self) -> Option<SessionEvents> {
        self.state.rx.lock().take()
    }

    pub fn notifier(&self) -> SessionNotifier {
        SessionNotifier {
            state: self.state.clone(),
        }
    }

    /// Files and directory trees whose changes trigger an update.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let targets = self.state.targets.lock();
        let mut paths: Vec<_> = targets.files.iter().chain(&targets.trees).cloned().collect();
        paths.sort();
        paths
    }

    /// Stop watching and close the event channel.
    pub fn close(&self) {
        self.state.tx.lock().take();
        self.state.watcher.lock().take();
        self.state.dirs.lock().clear();
        *self.state.targets.lock() = Targets::default();
        tracing::debug!("watch session closed");
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }
}

impl Bundler for WatchBundler {
    fn bundle(&self) -> ChunkStream {
        let inner = self.inner.lock().clone();
        let mut chunks = inner.bundle();
        let entry = self.entry.clone();
        let state = self.state.clone();

        Box::pin(async_stream::stream! {
            let started = Instant::now();
            let mut written = 0usize;
            let mut failed = false;

            while let Some(item) = chunks.next().await {
                match item {
                    Ok(chunk) => {
                        written += chunk.len();
                        yield Ok(chunk);
                    }
                    Err(err) => {
                        failed = true;
                        yield Err(err);
                        break;
                    }
                }
            }

            // Watch even after a failure so that fixing the source rebundles.
            let mut paths = inner.dependencies();
            paths.extend(entry);
            state.watch_paths(paths);

            if !failed {
                state.send(SessionEvent::Log(format!(
                    "{} bytes written ({:.2} seconds)",
                    written,
                    started.elapsed().as_secs_f64()
                )));
            }
        })
    }

    fn dependencies(&self) -> Vec<PathBuf> {
        self.inner.lock().dependencies()
    }
}
