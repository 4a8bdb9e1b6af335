//! Project - read-only view over the trials under one log root.
//!
//! A trial registers itself simply by existing: any child directory of
//! the log root holding a `trial.json` is a trial, keyed by its id.

use std::fs;
use std::path::{Path, PathBuf};

use crate::artifacts::MANIFEST_FILE;
use crate::experiment::{ArtifactRecord, MetricRecord, ParamMap, TrialRecord};
use crate::metrics::{self, METRICS_FILE};
use crate::storage;
use crate::trial::{PARAMS_FILE, TRIAL_FILE};
use crate::{Error, Result};

/// Trials grouped under a log root.
#[derive(Debug, Clone)]
pub struct Project {
    log_dir: PathBuf,
}

impl Project {
    /// Open the project rooted at `log_dir`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if `log_dir` is not a directory.
    pub fn open(log_dir: impl Into<PathBuf>) -> Result<Self> {
        let log_dir = log_dir.into();
        if !log_dir.is_dir() {
            return Err(Error::NotFound(log_dir.display().to_string()));
        }
        Ok(Self { log_dir })
    }

    /// Log root.
    #[must_use]
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Ids of every trial, sorted.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the log root cannot be listed.
    pub fn trial_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.log_dir)? {
            let entry = entry?;
            if !entry.path().join(TRIAL_FILE).is_file() {
                continue;
            }
            if let Ok(id) = entry.file_name().into_string() {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Lifecycle records of every trial, sorted by id.
    ///
    /// # Errors
    ///
    /// Returns an error if a trial record cannot be read.
    pub fn trials(&self) -> Result<Vec<TrialRecord>> {
        self.trial_ids()?.iter().map(|id| self.trial(id)).collect()
    }

    /// Lifecycle record of trial `id`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown id.
    pub fn trial(&self, id: &str) -> Result<TrialRecord> {
        storage::read_json(&self.trial_dir(id)?.join(TRIAL_FILE))
    }

    /// Parameters of trial `id`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown id.
    pub fn params(&self, id: &str) -> Result<ParamMap> {
        ParamMap::read(&self.trial_dir(id)?.join(PARAMS_FILE))
    }

    /// Metric ledger of trial `id`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown id.
    pub fn metrics(&self, id: &str) -> Result<Vec<MetricRecord>> {
        metrics::read(&self.trial_dir(id)?.join(METRICS_FILE))
    }

    /// Artifact manifest of trial `id`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown id.
    pub fn artifacts(&self, id: &str) -> Result<Vec<ArtifactRecord>> {
        storage::read_json_lines(&self.trial_dir(id)?.join(MANIFEST_FILE))
    }

    fn trial_dir(&self, id: &str) -> Result<PathBuf> {
        let single_component = !id.is_empty() && !id.contains(['/', '\\']) && id != "." && id != "..";
        let dir = self.log_dir.join(id);
        if single_component && dir.join(TRIAL_FILE).is_file() {
            Ok(dir)
        } else {
            Err(Error::NotFound(format!("trial '{id}'")))
        }
    }
}
