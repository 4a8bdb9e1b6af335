//! Metric Log - append-only, iteration-indexed ledger (`metrics.jsonl`)
//!
//! Each record is one JSON line written with a single `write_all` and
//! flushed before `append` returns, so a read-back in the same process
//! always sees it (read-your-writes).

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::experiment::{Fields, MetricRecord, MetricValue};
use crate::storage;
use crate::{Error, Result};

/// File name of the ledger inside the trial directory.
pub const METRICS_FILE: &str = "metrics.jsonl";

/// Append-only metric ledger for one trial.
#[derive(Debug)]
pub struct MetricLog {
    path: PathBuf,
    file: File,
    last_iteration: Option<u64>,
    len: usize,
}

impl MetricLog {
    /// Open (or create) the ledger in `trial_dir`.
    ///
    /// Existing records are scanned so the auto-increment counter resumes
    /// after the last recorded iteration. A torn final line left by a crash
    /// is cut off first so new records start on a fresh line.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or holds a corrupt
    /// record before its final line.
    pub fn open(trial_dir: &Path) -> Result<Self> {
        let path = trial_dir.join(METRICS_FILE);
        storage::repair_tail(&path)?;
        let existing: Vec<MetricRecord> = storage::read_json_lines(&path)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file,
            last_iteration: existing.last().map(MetricRecord::iteration),
            len: existing.len(),
        })
    }

    /// Ledger file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records appended so far.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Check if the ledger has no records.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Last recorded iteration, if any.
    #[must_use]
    pub const fn last_iteration(&self) -> Option<u64> {
        self.last_iteration
    }

    /// Iteration an omitted `iteration` argument resolves to.
    #[must_use]
    pub fn next_iteration(&self) -> u64 {
        self.last_iteration.map_or(0, |last| last.saturating_add(1))
    }

    /// Append a record.
    ///
    /// `None` uses the auto-increment counter. Explicit iterations may
    /// skip ahead or repeat the last one, but never go backwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NonMonotonicIteration`] for a decreasing
    /// iteration (nothing is written), or an IO error.
    pub fn append(&mut self, iteration: Option<u64>, fields: Fields) -> Result<MetricRecord> {
        let iteration = iteration.unwrap_or_else(|| self.next_iteration());
        if let Some(last) = self.last_iteration {
            if iteration < last {
                return Err(Error::NonMonotonicIteration { last, got: iteration });
            }
        }
        let record = MetricRecord::new(iteration, fields);
        storage::append_json_line(&mut self.file, &record)?;
        self.last_iteration = Some(iteration);
        self.len += 1;
        debug!(iteration, fields = record.fields().len(), "metric appended");
        Ok(record)
    }

    /// Append a record from `(name, value)` pairs.
    ///
    /// # Errors
    ///
    /// See [`MetricLog::append`].
    pub fn append_pairs<I, K, V>(&mut self, iteration: Option<u64>, pairs: I) -> Result<MetricRecord>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: MetricValue,
    {
        let fields = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into_value()))
            .collect();
        self.append(iteration, fields)
    }

    /// Force appended records to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the sync fails.
    pub fn flush(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Read every record back in append order.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read or is corrupt.
    pub fn records(&self) -> Result<Vec<MetricRecord>> {
        read(&self.path)
    }

    /// Records for a single field, in append order, as `(iteration, value)`.
    ///
    /// # Errors
    ///
    /// See [`MetricLog::records`].
    pub fn series(&self, name: &str) -> Result<Vec<(u64, Value)>> {
        Ok(self
            .records()?
            .into_iter()
            .filter_map(|r| r.get(name).cloned().map(|v| (r.iteration(), v)))
            .collect())
    }
}

/// Read a ledger file without opening it for append.
///
/// A missing file reads as an empty ledger.
///
/// # Errors
///
/// Returns an error if the ledger cannot be read or is corrupt.
pub fn read(path: &Path) -> Result<Vec<MetricRecord>> {
    storage::read_json_lines(path)
}

/// Size of the ledger on disk in bytes (0 when absent).
#[must_use]
pub fn ledger_size(trial_dir: &Path) -> u64 {
    fs::metadata(trial_dir.join(METRICS_FILE)).map_or(0, |m| m.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_tmp() -> (tempfile::TempDir, MetricLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = MetricLog::open(dir.path()).unwrap();
        (dir, log)
    }

    #[test]
    fn test_auto_increment_starts_at_zero() {
        let (_dir, mut log) = open_tmp();
        assert_eq!(log.append_pairs(None, [("loss", 1.0)]).unwrap().iteration(), 0);
        assert_eq!(log.append_pairs(None, [("loss", 0.9)]).unwrap().iteration(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_auto_increment_follows_explicit() {
        let (_dir, mut log) = open_tmp();
        log.append_pairs(Some(10), [("loss", 1.0)]).unwrap();
        assert_eq!(log.append_pairs(None, [("loss", 0.9)]).unwrap().iteration(), 11);
    }

    #[test]
    fn test_decreasing_iteration_rejected() {
        let (_dir, mut log) = open_tmp();
        log.append_pairs(Some(5), [("loss", 1.0)]).unwrap();
        log.append_pairs(Some(5), [("acc", 0.2)]).unwrap();
        let err = log.append_pairs(Some(4), [("loss", 0.5)]).unwrap_err();
        assert!(matches!(err, Error::NonMonotonicIteration { last: 5, got: 4 }));
        assert_eq!(log.records().unwrap().len(), 2);
    }

    #[test]
    fn test_read_back_in_order() {
        let (_dir, mut log) = open_tmp();
        log.append_pairs(Some(1), [("loss", 0.5)]).unwrap();
        log.append_pairs(Some(2), [("loss", 0.3)]).unwrap();
        let records = log.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].iteration(), 1);
        assert_eq!(records[0].scalar("loss"), Some(0.5));
        assert_eq!(records[1].iteration(), 2);
        assert_eq!(records[1].scalar("loss"), Some(0.3));
    }

    #[test]
    fn test_reopen_resumes_counter() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut log = MetricLog::open(dir.path()).unwrap();
            log.append_pairs(Some(3), [("loss", 0.1)]).unwrap();
            log.flush().unwrap();
        }
        let log = MetricLog::open(dir.path()).unwrap();
        assert_eq!(log.next_iteration(), 4);
        assert!(ledger_size(dir.path()) > 0);
    }

    #[test]
    fn test_reopen_after_torn_append_keeps_ledger_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(METRICS_FILE);
        let first = serde_json::to_string(&MetricRecord::builder(0).field("loss", 1.0).build()).unwrap();
        fs::write(&path, format!("{first}\n{{\"iteration\":1,\"fi")).unwrap();

        let mut log = MetricLog::open(dir.path()).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log.next_iteration(), 1);
        log.append_pairs(None, [("loss", 0.8)]).unwrap();
        log.append_pairs(None, [("loss", 0.6)]).unwrap();

        let records = log.records().unwrap();
        let iterations: Vec<u64> = records.iter().map(MetricRecord::iteration).collect();
        assert_eq!(iterations, vec![0, 1, 2]);
        assert_eq!(records[2].scalar("loss"), Some(0.6));
        assert_eq!(read(&path).unwrap().len(), 3);
    }

    #[test]
    fn test_non_finite_values_recorded() {
        let (_dir, mut log) = open_tmp();
        log.append_pairs(Some(0), [("loss", f64::NAN), ("grad_norm", f64::INFINITY)])
            .unwrap();
        log.append_pairs(Some(1), [("loss", f64::NEG_INFINITY)]).unwrap();

        let records = log.records().unwrap();
        assert!(records[0].scalar("loss").unwrap().is_nan());
        assert_eq!(records[0].scalar("grad_norm"), Some(f64::INFINITY));
        assert_eq!(records[1].scalar("loss"), Some(f64::NEG_INFINITY));
        assert!(records.iter().all(|r| !r.fields().values().any(Value::is_null)));
    }

    #[test]
    fn test_series() {
        let (_dir, mut log) = open_tmp();
        log.append_pairs(Some(0), [("loss", 1.0)]).unwrap();
        log.append_pairs(Some(0), [("acc", 0.1)]).unwrap();
        log.append_pairs(Some(1), [("loss", 0.5)]).unwrap();
        let loss = log.series("loss").unwrap();
        assert_eq!(loss, vec![(0, Value::from(1.0)), (1, Value::from(0.5))]);
    }
}
