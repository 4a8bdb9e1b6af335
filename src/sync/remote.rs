//! Sync destinations.

use std::path::{Path, PathBuf};

use crate::storage;
use crate::Result;

/// Destination a trial directory is mirrored to.
///
/// `put` must be idempotent: putting the same path twice leaves exactly
/// one entry holding the last bytes, and a failed `put` must not leave a
/// truncated entry behind.
pub trait Remote: Send {
    /// Human-readable location, used in logs and errors.
    fn describe(&self) -> String;

    /// Store `bytes` at `rel_path` (`/`-separated, relative to the trial root).
    ///
    /// # Errors
    ///
    /// Any transfer failure. The sync agent retries on its next tick.
    fn put(&mut self, rel_path: &str, bytes: &[u8]) -> Result<()>;
}

/// Mirror into a directory (a mounted share, a bucket fuse mount, a local backup).
#[derive(Debug, Clone)]
pub struct LocalMirror {
    root: PathBuf,
}

impl LocalMirror {
    /// Mirror under `root`; created lazily on first transfer.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Mirror root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Remote for LocalMirror {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn put(&mut self, rel_path: &str, bytes: &[u8]) -> Result<()> {
        let target = rel_path
            .split('/')
            .fold(self.root.clone(), |acc, part| acc.join(part));
        storage::write_atomic(&target, bytes)
    }
}
