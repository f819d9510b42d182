//! Bundler adapter that delegates to an external executable.
//!
//! The argument template may contain `{entry}`, replaced by the entry path, or
//! by `-` when the entry is in memory and written to the child's stdin. For
//! in-memory entries the base directory becomes the child's working directory,
//! so relative imports resolve as if the content lived there. The child's
//! stdout is the bundle.
//!
//! An external process cannot report what it read, so the files and
//! directories a bundle depends on are declared on the [`CommandSpec`] with
//! [`CommandSpec::watch`]. In watch mode they are watched next to the entry.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::bundler::{Bundler, BundlerFactory, BundlerInput, ChunkStream, Entry};
use crate::error::BundleError;

const ENTRY_PLACEHOLDER: &str = "{entry}";
const STDIN_ENTRY: &str = "-";
const CHUNK_SIZE: usize = 8 * 1024;

/// Program and argument template of an external bundler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Extra dependencies; relative paths resolve from the base directory
    pub watch: Vec<PathBuf>,
}

impl CommandSpec {
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            watch: Vec::new(),
        }
    }

    /// Declare files or directories the bundle depends on.
    pub fn watch(mut self, paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.watch.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Parse a whitespace-separated command line such as `esbuild --bundle {entry}`.
    pub fn parse(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts))
    }

    /// Arguments for `entry`. Without a placeholder, path entries are appended.
    fn args_for(&self, entry: &Entry) -> Vec<String> {
        let replacement = match entry {
            Entry::Path(path) => path.to_string_lossy().into_owned(),
            Entry::Source(_) => STDIN_ENTRY.to_string(),
        };

        let has_placeholder = self.args.iter().any(|a| a.contains(ENTRY_PLACEHOLDER));
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace(ENTRY_PLACEHOLDER, &replacement))
            .collect();

        if !has_placeholder && matches!(entry, Entry::Path(_)) {
            args.push(replacement);
        }
        args
    }
}

/// Factory producing [`CommandBundler`]s for one command.
#[derive(Debug, Clone)]
pub struct CommandBundlerFactory {
    spec: CommandSpec,
}

impl CommandBundlerFactory {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

impl BundlerFactory for CommandBundlerFactory {
    fn create(&self, input: BundlerInput) -> Arc<dyn Bundler> {
        Arc::new(CommandBundler::new(self.spec.clone(), input))
    }
}

/// One external bundler invocation per run.
#[derive(Debug, Clone)]
pub struct CommandBundler {
    spec: CommandSpec,
    input: BundlerInput,
}

impl CommandBundler {
    pub fn new(spec: CommandSpec, input: BundlerInput) -> Self {
        Self { spec, input }
    }
}

impl Bundler for CommandBundler {
    fn bundle(&self) -> ChunkStream {
        let mut command = Command::new(&self.spec.program);
        command
            .args(self.spec.args_for(&self.input.entry))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(basedir) = &self.input.basedir {
            command.current_dir(basedir);
        }

        let source = match &self.input.entry {
            Entry::Source(source) => {
                command.stdin(Stdio::piped());
                Some(source.bytes().clone())
            }
            Entry::Path(_) => {
                command.stdin(Stdio::null());
                None
            }
        };
        let program = self.spec.program.clone();

        Box::pin(async_stream::stream! {
            tracing::debug!(program = %program, "spawning bundler");
            let mut child = match command.spawn() {
                Ok(child) => child,
                Err(e) => {
                    yield Err(BundleError::from(e));
                    return;
                }
            };

            let writer = match (child.stdin.take(), source) {
                (Some(mut stdin), Some(bytes)) => Some(tokio::spawn(async move {
                    let result = stdin.write_all(&bytes).await;
                    drop(stdin);
                    result
                })),
                _ => None,
            };

            let mut stderr = child.stderr.take();
            let stderr_task = tokio::spawn(async move {
                let mut text = String::new();
                if let Some(stderr) = stderr.as_mut() {
                    let _ = stderr.read_to_string(&mut text).await;
                }
                text
            });

            if let Some(mut stdout) = child.stdout.take() {
                loop {
                    let mut buffer = BytesMut::with_capacity(CHUNK_SIZE);
                    match stdout.read_buf(&mut buffer).await {
                        Ok(0) => break,
                        Ok(_) => {
                            yield Ok(buffer.freeze());
                        }
                        Err(e) => {
                            yield Err(BundleError::from(e));
                            return;
                        }
                    }
                }
            }

            if let Some(writer) = writer {
                // A bundler may exit before draining stdin; its exit status decides.
                if let Ok(Err(e)) = writer.await {
                    tracing::debug!(error = %e, "bundler closed stdin early");
                }
            }

            match child.wait().await {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    let stderr_text = stderr_task.await.unwrap_or_default();
                    yield Err(BundleError::from_process(status, &stderr_text));
                }
                Err(e) => {
                    yield Err(BundleError::from(e));
                }
            }
        })
    }

    fn dependencies(&self) -> Vec<PathBuf> {
        self.spec
            .watch
            .iter()
            .map(|path| match &self.input.basedir {
                Some(basedir) if path.is_relative() => basedir.join(path),
                _ => path.clone(),
            })
            .collect()
    }
}
