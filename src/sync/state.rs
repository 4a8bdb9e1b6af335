//! Sync marker persisted at `<trial_dir>/.sync/state.json`.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage;
use crate::{Error, Result};

/// What the remote is known to hold.
///
/// `committed` maps a trial-relative path (with `/` separators) to the
/// sha256 of the bytes last transferred for it. An entry is inserted only
/// after the remote acknowledged the transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    committed: BTreeMap<String, String>,
    last_attempt: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
    pending: bool,
}

impl SyncState {
    /// Load a persisted marker.
    ///
    /// A missing or unreadable marker yields an empty state; the next tick
    /// then re-sends everything, which the remote tolerates.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match storage::read_json(path) {
            Ok(state) => state,
            Err(Error::NotFound(_)) => Self::default(),
            Err(err) => {
                warn!(path = %path.display(), %err, "discarding unreadable sync marker");
                Self::default()
            }
        }
    }

    /// Persist the marker atomically.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the marker cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        storage::write_json(path, self)
    }

    /// Digest committed for `rel_path`, if any.
    #[must_use]
    pub fn committed(&self, rel_path: &str) -> Option<&str> {
        self.committed.get(rel_path).map(String::as_str)
    }

    /// Number of files the remote holds.
    #[must_use]
    pub fn committed_len(&self) -> usize {
        self.committed.len()
    }

    /// Whether the last attempt left changes untransferred.
    #[must_use]
    pub const fn pending(&self) -> bool {
        self.pending
    }

    /// Start of the last attempt.
    #[must_use]
    pub const fn last_attempt(&self) -> Option<DateTime<Utc>> {
        self.last_attempt
    }

    /// End of the last fully successful attempt.
    #[must_use]
    pub const fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    pub(crate) fn begin_attempt(&mut self) {
        self.last_attempt = Some(Utc::now());
        self.pending = true;
    }

    pub(crate) fn commit(&mut self, rel_path: String, digest: String) {
        self.committed.insert(rel_path, digest);
    }

    pub(crate) fn finish_success(&mut self) {
        self.pending = false;
        self.last_success = Some(Utc::now());
    }
}
