//! Intermediate file layout and cleanup.
//!
//! For input `<in>` the pipeline materializes bucket `i` as `<in>.tmp.<i>`
//! (uncompressed, one record per line) and its sorted shard as
//! `<in>.tmp.sorted.<i>` (compressed). Both are transient: each is written
//! once, read once by its single consumer, then deleted. On error paths the
//! driver removes every intermediate regardless of its state.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::warn;

/// Path scheme for a run's intermediate files.
#[derive(Debug, Clone)]
pub struct TempLayout {
    base: PathBuf,
}

impl TempLayout {
    /// Creates the layout rooted at the input path.
    #[must_use]
    pub fn new(input: &Path) -> Self {
        Self { base: input.to_path_buf() }
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut name = OsString::from(self.base.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    }

    /// Uncompressed bucket file for bucket `id`.
    #[must_use]
    pub fn bucket_path(&self, id: usize) -> PathBuf {
        self.with_suffix(&format!(".tmp.{id}"))
    }

    /// Compressed shard for bucket `id`.
    #[must_use]
    pub fn shard_path(&self, id: usize) -> PathBuf {
        self.with_suffix(&format!(".tmp.sorted.{id}"))
    }

    /// Best-effort removal of every intermediate for `bucket_count` buckets,
    /// in whatever state it is in. Missing files are expected on most paths;
    /// other removal failures are logged and otherwise ignored.
    pub fn remove_intermediates(&self, bucket_count: usize) {
        for id in 0..bucket_count {
            for path in [self.bucket_path(id), self.shard_path(id)] {
                if let Err(e) = std::fs::remove_file(&path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!("could not remove intermediate '{}': {e}", path.display());
                    }
                }
            }
        }
    }
}
