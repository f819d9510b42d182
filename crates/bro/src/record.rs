//! File records flowing through the pipeline.

use bytes::Bytes;
use std::path::{Path, PathBuf};

/// One logical file travelling through the pipeline.
///
/// A record either references a file on disk (`contents` is `None`, a "null"
/// record) or carries materialized bytes that must be streamed to the bundler.
/// The bundle cycle replaces `contents` in place with the bundled output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Filesystem location of the file
    pub path: PathBuf,
    /// Base directory used to resolve relative dependencies
    pub base: PathBuf,
    /// Materialized content, `None` for path references
    pub contents: Option<Bytes>,
}

impl FileRecord {
    /// Create a null record that only references `path`.
    pub fn from_path(path: impl Into<PathBuf>, base: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            base: base.into(),
            contents: None,
        }
    }

    /// Create a record carrying in-memory content.
    pub fn with_contents(
        path: impl Into<PathBuf>,
        base: impl Into<PathBuf>,
        contents: impl Into<Bytes>,
    ) -> Self {
        Self {
            path: path.into(),
            base: base.into(),
            contents: Some(contents.into()),
        }
    }

    /// True when the record has no content buffer.
    pub fn is_null(&self) -> bool {
        self.contents.is_none()
    }

    /// Replace the content buffer.
    pub fn set_contents(&mut self, contents: impl Into<Bytes>) {
        self.contents = Some(contents.into());
    }

    /// Content as a byte slice, empty for null records.
    pub fn contents_bytes(&self) -> &[u8] {
        self.contents.as_deref().unwrap_or_default()
    }

    /// Path relative to `base`, falling back to the file name.
    ///
    /// Hosts use this to place bundled output under an output directory.
    pub fn relative(&self) -> &Path {
        match self.path.strip_prefix(&self.base) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => self
                .path
                .file_name()
                .map(Path::new)
                .unwrap_or(self.path.as_path()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_record() {
        let record = FileRecord::from_path("/src/a.js", "/src");
        assert!(record.is_null());
        assert!(record.contents_bytes().is_empty());
    }

    #[test]
    fn test_set_contents_overwrites() {
        let mut record = FileRecord::with_contents("/src/a.js", "/src", "first");
        assert!(!record.is_null());

        record.set_contents("second");
        assert_eq!(record.contents_bytes(), b"second");
    }

    #[test]
    fn test_relative_path() {
        let record = FileRecord::from_path("/src/lib/a.js", "/src");
        assert_eq!(record.relative(), Path::new("lib/a.js"));
    }

    #[test]
    fn test_relative_outside_base_uses_file_name() {
        let record = FileRecord::from_path("/other/a.js", "/src");
        assert_eq!(record.relative(), Path::new("a.js"));
    }
}
