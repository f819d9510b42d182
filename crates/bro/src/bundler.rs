//! Contract of the external module bundler.
//!
//! Bro never resolves modules itself. A [`Bundler`] is a black box bound to
//! one entry: invoking [`Bundler::bundle`] yields the bundle as a stream of
//! byte chunks, terminated by the end of the stream or by the first error.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, BoxStream};

use crate::error::BundleError;

/// Stream of bundle output chunks.
///
/// The stream ending is the end signal; an `Err` item is the error signal and
/// no further items are read after it.
pub type ChunkStream = BoxStream<'static, Result<Bytes, BundleError>>;

/// Entry point handed to a bundler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// Read the entry from disk
    Path(PathBuf),
    /// Stream the entry from memory
    Source(EntrySource),
}

impl Entry {
    pub fn as_path(&self) -> Option<&std::path::Path> {
        match self {
            Entry::Path(path) => Some(path),
            Entry::Source(_) => None,
        }
    }

    pub fn as_source(&self) -> Option<&EntrySource> {
        match self {
            Entry::Path(_) => None,
            Entry::Source(source) => Some(source),
        }
    }
}

/// In-memory entry content.
#[derive(Clone, PartialEq, Eq)]
pub struct EntrySource {
    bytes: Bytes,
}

impl EntrySource {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Readable stream over the content.
    pub fn into_stream(self) -> BoxStream<'static, std::io::Result<Bytes>> {
        Box::pin(stream::iter(std::iter::once(Ok(self.bytes))))
    }

    /// `AsyncRead` over the content.
    pub fn reader(&self) -> std::io::Cursor<Bytes> {
        std::io::Cursor::new(self.bytes.clone())
    }
}

impl fmt::Debug for EntrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntrySource")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Everything a bundler needs to be constructed for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlerInput {
    pub entry: Entry,
    /// Directory relative dependencies resolve from, for in-memory entries
    pub basedir: Option<PathBuf>,
}

/// A bundler bound to one entry.
pub trait Bundler: Send + Sync {
    /// Start one bundling run.
    fn bundle(&self) -> ChunkStream;

    /// Files the last run depended on.
    ///
    /// Watch mode re-registers these after every run. Bundlers that cannot
    /// report dependencies return an empty list.
    fn dependencies(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Constructs bundlers for records.
///
/// Construction never fails; an invalid entry surfaces as an error in the
/// stream returned by [`Bundler::bundle`].
pub trait BundlerFactory: Send + Sync {
    fn create(&self, input: BundlerInput) -> Arc<dyn Bundler>;
}

impl<F> BundlerFactory for F
where
    F: Fn(BundlerInput) -> Arc<dyn Bundler> + Send + Sync,
{
    fn create(&self, input: BundlerInput) -> Arc<dyn Bundler> {
        self(input)
    }
}
