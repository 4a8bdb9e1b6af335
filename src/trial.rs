//! Trial - one experiment run and its directory
//!
//! A `Trial` is an explicit context object: it can be used directly and
//! threaded through code by reference, or installed as the process-wide
//! trial via [`crate::init`].
//!
//! ## Lifecycle
//!
//! ```text
//! Created ──start()──> Started ──close()──> Closed
//! ```
//!
//! Data operations (`metric`, `save`, `load`) are only accepted while
//! `Started`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::artifacts::{self, ArtifactStore, JsonSerializer, Serializer};
use crate::config::TrialConfig;
use crate::experiment::{ArtifactRecord, MetricRecord, MetricValue, ParamMap, TrialRecord, TrialState};
use crate::metrics::{self, MetricLog};
use crate::reporter::{self, MetricSink};
use crate::storage;
use crate::sync::{LocalMirror, Remote, SyncAgent, SyncState};
use crate::{Error, Result};

/// Lifecycle record file.
pub const TRIAL_FILE: &str = "trial.json";
/// Parameter file.
pub const PARAMS_FILE: &str = "params.json";

const ID_SUFFIX_LEN: usize = 8;

/// One experiment run.
///
/// ```rust,no_run
/// use track_ml::{Trial, TrialConfig};
///
/// let mut trial = Trial::new(TrialConfig::builder().log_dir("/tmp/runs").trial_prefix("mnist-").build());
/// trial.start()?;
/// trial.metric(Some(0), [("loss", 2.3)])?;
/// trial.save(&vec![0.1_f32, 0.2], "weights", Some(0))?;
/// trial.close()?;
/// # Ok::<(), track_ml::Error>(())
/// ```
pub struct Trial {
    record: TrialRecord,
    log_dir: PathBuf,
    trial_dir: PathBuf,
    upload_dir: Option<PathBuf>,
    remote: Option<Box<dyn Remote>>,
    sync_period: Option<Duration>,
    params: ParamMap,
    init_logging: bool,
    reporter: Option<Box<dyn MetricSink>>,
    metrics: Option<MetricLog>,
    artifacts: Option<ArtifactStore>,
    sync: Option<SyncAgent>,
}

impl Trial {
    /// Construct a trial in `Created` state. Nothing touches the disk yet.
    #[must_use]
    pub fn new(config: TrialConfig) -> Self {
        let sync_period = config.sync_period();
        let suffix = Uuid::new_v4().simple().to_string();
        let trial_id = format!("{}{}", config.trial_prefix, &suffix[..ID_SUFFIX_LEN]);
        let trial_dir = config.log_dir.join(&trial_id);
        Self {
            record: TrialRecord::new(trial_id, config.trial_prefix),
            log_dir: config.log_dir,
            trial_dir,
            upload_dir: config.upload_dir,
            remote: config.remote,
            sync_period,
            params: config.param_map,
            init_logging: config.init_logging,
            reporter: config.reporter,
            metrics: None,
            artifacts: None,
            sync: None,
        }
    }

    /// Trial identifier (`<prefix><8 hex chars>`), also the directory name.
    #[must_use]
    pub fn trial_id(&self) -> &str {
        self.record.trial_id()
    }

    /// Directory owned by this trial.
    #[must_use]
    pub fn trial_dir(&self) -> &Path {
        &self.trial_dir
    }

    /// Log root the trial directory lives under.
    #[must_use]
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> TrialState {
        self.record.state()
    }

    /// Lifecycle record as persisted in `trial.json`.
    #[must_use]
    pub const fn record(&self) -> &TrialRecord {
        &self.record
    }

    /// Run parameters.
    #[must_use]
    pub const fn params(&self) -> &ParamMap {
        &self.params
    }

    /// Sync marker, if a sync agent is active.
    #[must_use]
    pub fn sync_state(&self) -> Option<SyncState> {
        self.sync.as_ref().map(SyncAgent::state)
    }

    /// Create the trial directory, persist params and start syncing.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] unless `Created`; [`Error::InvalidName`] if
    /// the prefix would place the trial outside `log_dir` or hide it;
    /// [`Error::Directory`] if the log or trial directory cannot be
    /// created; IO errors while writing the initial files.
    pub fn start(&mut self) -> Result<()> {
        self.expect_state(TrialState::Created)?;
        let prefix = self.record.trial_prefix();
        if prefix.contains(['/', '\\']) || storage::is_internal(self.trial_id()) {
            return Err(Error::InvalidName(prefix.to_string()));
        }
        if self.init_logging {
            crate::logging::init_logging();
        }

        storage::create_dir(&self.log_dir)?;
        storage::create_dir(&self.trial_dir)?;
        let metrics = MetricLog::open(&self.trial_dir)?;
        let artifacts = ArtifactStore::open(&self.trial_dir)?;
        self.params.persist(&self.trial_dir.join(PARAMS_FILE))?;

        self.record.start();
        storage::write_json(&self.trial_dir.join(TRIAL_FILE), &self.record)?;
        self.metrics = Some(metrics);
        self.artifacts = Some(artifacts);

        let remote = self.remote.take().or_else(|| {
            self.upload_dir
                .as_ref()
                .map(|dir| Box::new(LocalMirror::new(dir.join(self.record.trial_id()))) as Box<dyn Remote>)
        });
        match (remote, self.sync_period) {
            (Some(remote), Some(period)) => {
                let mut agent = SyncAgent::new(&self.trial_dir, remote);
                agent.start(period)?;
                self.sync = Some(agent);
            }
            (Some(remote), None) => {
                warn!(remote = %remote.describe(), "upload location set without a sync period; sync disabled");
            }
            (None, _) => {}
        }

        info!(trial_id = %self.trial_id(), dir = %self.trial_dir.display(), "trial started");
        Ok(())
    }

    /// Append a metric record.
    ///
    /// `iteration: None` uses the trial's auto-increment counter. The
    /// record is on disk before the reporter (if any) sees it; reporter
    /// failures are logged and never returned.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] unless `Started`;
    /// [`Error::NonMonotonicIteration`]; IO errors.
    pub fn metric<I, K, V>(&mut self, iteration: Option<u64>, fields: I) -> Result<MetricRecord>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: MetricValue,
    {
        self.expect_state(TrialState::Started)?;
        let log = self.metrics.as_mut().ok_or(Error::InvalidState {
            expected: TrialState::Started,
            actual: self.record.state(),
        })?;
        let record = log.append_pairs(iteration, fields)?;
        if let Some(sink) = self.reporter.as_deref_mut() {
            reporter::forward(sink, &record);
        }
        Ok(record)
    }

    /// Save `obj` as JSON under `(obj_name, iteration)`.
    ///
    /// # Errors
    ///
    /// See [`Trial::save_with`].
    pub fn save<T: Serialize + DeserializeOwned>(
        &mut self,
        obj: &T,
        obj_name: &str,
        iteration: Option<u64>,
    ) -> Result<PathBuf> {
        self.save_with(obj, obj_name, iteration, &JsonSerializer)
    }

    /// Save `obj` with an explicit serializer.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] unless `Started`, plus the errors of
    /// [`ArtifactStore::save`].
    pub fn save_with<T, S>(&mut self, obj: &T, obj_name: &str, iteration: Option<u64>, serializer: &S) -> Result<PathBuf>
    where
        S: Serializer<T> + ?Sized,
    {
        self.artifact_store_mut()?.save(obj, obj_name, iteration, serializer)
    }

    /// Save `obj`, explicitly replacing an existing numbered version.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] unless `Started`, plus the errors of
    /// [`ArtifactStore::overwrite`].
    pub fn overwrite_with<T, S>(
        &mut self,
        obj: &T,
        obj_name: &str,
        iteration: Option<u64>,
        serializer: &S,
    ) -> Result<PathBuf>
    where
        S: Serializer<T> + ?Sized,
    {
        self.artifact_store_mut()?.overwrite(obj, obj_name, iteration, serializer)
    }

    /// Load a JSON artifact.
    ///
    /// # Errors
    ///
    /// See [`Trial::load_with`].
    pub fn load<T: Serialize + DeserializeOwned>(&self, obj_name: &str, iteration: Option<u64>) -> Result<T> {
        self.load_with(obj_name, iteration, &JsonSerializer)
    }

    /// Load an artifact with an explicit serializer.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] unless `Started`, [`Error::NotFound`],
    /// [`Error::Deserialization`].
    pub fn load_with<T, S>(&self, obj_name: &str, iteration: Option<u64>, serializer: &S) -> Result<T>
    where
        S: Serializer<T> + ?Sized,
    {
        self.artifact_store()?.load(obj_name, iteration, serializer)
    }

    /// Numbered versions saved for `obj_name`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] unless `Started`; [`Error::InvalidName`].
    pub fn versions(&self, obj_name: &str) -> Result<Vec<u64>> {
        self.artifact_store()?.versions(obj_name)
    }

    /// Metric ledger read back in append order (any state after start).
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn metrics(&self) -> Result<Vec<MetricRecord>> {
        metrics::read(&self.trial_dir.join(metrics::METRICS_FILE))
    }

    /// Artifact manifest in save order (any state after start).
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be read.
    pub fn artifacts(&self) -> Result<Vec<ArtifactRecord>> {
        storage::read_json_lines(&self.trial_dir.join(artifacts::MANIFEST_FILE))
    }

    /// Flush the ledger, run the final sync and mark the trial `Closed`.
    ///
    /// The trial is `Closed` even when the final sync fails; local data is
    /// complete and the error is returned so the caller can re-sync.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] unless `Started`; IO errors while flushing;
    /// [`Error::Sync`] if the final sync fails.
    pub fn close(&mut self) -> Result<()> {
        self.expect_state(TrialState::Started)?;
        let flushed = self.metrics.as_mut().map_or(Ok(()), MetricLog::flush);

        self.record.close();
        let recorded = storage::write_json(&self.trial_dir.join(TRIAL_FILE), &self.record);
        let synced = self.sync.take().map_or(Ok(()), |agent| agent.close().map(|_| ()));
        self.metrics = None;
        self.artifacts = None;

        info!(trial_id = %self.trial_id(), "trial closed");
        flushed.and(recorded).and(synced)
    }

    fn artifact_store(&self) -> Result<&ArtifactStore> {
        self.expect_state(TrialState::Started)?;
        self.artifacts.as_ref().ok_or(Error::InvalidState {
            expected: TrialState::Started,
            actual: self.record.state(),
        })
    }

    fn artifact_store_mut(&mut self) -> Result<&mut ArtifactStore> {
        self.expect_state(TrialState::Started)?;
        let actual = self.record.state();
        self.artifacts.as_mut().ok_or(Error::InvalidState {
            expected: TrialState::Started,
            actual,
        })
    }

    fn expect_state(&self, expected: TrialState) -> Result<()> {
        let actual = self.record.state();
        if actual == expected {
            Ok(())
        } else {
            Err(Error::InvalidState { expected, actual })
        }
    }
}

impl Drop for Trial {
    fn drop(&mut self) {
        if self.record.state() == TrialState::Started {
            warn!(trial_id = %self.trial_id(), "trial dropped without close; final sync skipped");
        }
    }
}

impl std::fmt::Debug for Trial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trial")
            .field("trial_id", &self.trial_id())
            .field("state", &self.state())
            .field("trial_dir", &self.trial_dir)
            .field("sync", &self.sync)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    fn config(dir: &Path) -> TrialConfig {
        TrialConfig::builder()
            .log_dir(dir)
            .trial_prefix("run-")
            .init_logging(false)
            .build()
    }

    #[test]
    fn test_trial_dir_named_from_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let trial = Trial::new(config(dir.path()));
        assert!(trial.trial_id().starts_with("run-"));
        assert_eq!(trial.trial_id().len(), "run-".len() + ID_SUFFIX_LEN);
        assert_eq!(trial.trial_dir(), dir.path().join(trial.trial_id()));
        assert!(!trial.trial_dir().exists());
    }

    #[test]
    fn test_data_ops_rejected_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut trial = Trial::new(config(dir.path()));
        assert!(matches!(
            trial.metric(None, [("loss", 1.0)]),
            Err(Error::InvalidState { actual: TrialState::Created, .. })
        ));
        assert!(matches!(trial.save(&1_u8, "x", None), Err(Error::InvalidState { .. })));
        assert!(matches!(trial.load::<u8>("x", None), Err(Error::InvalidState { .. })));
        assert!(matches!(trial.close(), Err(Error::InvalidState { .. })));
    }

    #[test]
    fn test_prefix_must_stay_inside_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("runs");
        let outside = dir.path().join("elsewhere");
        let escaping = format!("{}/x-", outside.display());
        for prefix in ["../x-", "nested/x-", "a\\b-", ".hidden-", escaping.as_str()] {
            let mut trial = Trial::new(
                TrialConfig::builder()
                    .log_dir(&log_dir)
                    .trial_prefix(prefix)
                    .init_logging(false)
                    .build(),
            );
            let err = trial.start().unwrap_err();
            assert!(matches!(err, Error::InvalidName(ref p) if p == prefix), "{prefix:?}");
            assert_eq!(trial.state(), TrialState::Created);
        }
        assert!(!log_dir.exists());
        assert!(!outside.exists());
    }

    #[test]
    fn test_start_writes_params_and_record() {
        let dir = tempfile::tempdir().unwrap();
        let params = ParamMap::new().with("lr", 0.01);
        let mut trial = Trial::new(
            TrialConfig::builder()
                .log_dir(dir.path())
                .param_map(params.clone())
                .init_logging(false)
                .build(),
        );
        trial.start().unwrap();
        assert_eq!(ParamMap::read(&trial.trial_dir().join(PARAMS_FILE)).unwrap(), params);
        let record: TrialRecord = storage::read_json(&trial.trial_dir().join(TRIAL_FILE)).unwrap();
        assert_eq!(record.state(), TrialState::Started);
        assert!(matches!(trial.start(), Err(Error::InvalidState { .. })));
        trial.close().unwrap();
    }

    #[test]
    fn test_closed_trial_rejects_data_ops() {
        let dir = tempfile::tempdir().unwrap();
        let mut trial = Trial::new(config(dir.path()));
        trial.start().unwrap();
        trial.metric(Some(0), [("acc", 0.1)]).unwrap();
        trial.close().unwrap();

        assert_eq!(trial.state(), TrialState::Closed);
        assert!(matches!(
            trial.metric(None, [("acc", 0.2)]),
            Err(Error::InvalidState { actual: TrialState::Closed, .. })
        ));
        assert_eq!(trial.metrics().unwrap().len(), 1);
        let record: TrialRecord = storage::read_json(&trial.trial_dir().join(TRIAL_FILE)).unwrap();
        assert_eq!(record.state(), TrialState::Closed);
    }

    #[test]
    fn test_reporter_failure_does_not_fail_metric() {
        let dir = tempfile::tempdir().unwrap();
        let mut trial = Trial::new(
            TrialConfig::builder()
                .log_dir(dir.path())
                .init_logging(false)
                .reporter(|_: u64, _: &crate::Fields| -> anyhow::Result<()> { anyhow::bail!("down") })
                .build(),
        );
        trial.start().unwrap();
        trial.metric(None, [("loss", 0.4)]).unwrap();
        assert_eq!(trial.metrics().unwrap().len(), 1);
        trial.close().unwrap();
    }

    #[test]
    fn test_reporter_sees_records() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let mut trial = Trial::new(
            TrialConfig::builder()
                .log_dir(dir.path())
                .init_logging(false)
                .reporter(move |i: u64, f: &crate::Fields| -> anyhow::Result<()> {
                    sink_seen.lock().unwrap().push((i, f.clone()));
                    Ok(())
                })
                .build(),
        );
        trial.start().unwrap();
        trial.metric(Some(2), [("loss", 0.3)]).unwrap();
        trial.close().unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, 2);
        assert_eq!(seen[0].1.get("loss"), Some(&Value::from(0.3)));
    }

    #[test]
    fn test_start_fails_on_unwritable_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let mut trial = Trial::new(config(&blocker.join("nested")));
        assert!(matches!(trial.start(), Err(Error::Directory { .. })));
        assert_eq!(trial.state(), TrialState::Created);
    }

    #[test]
    fn test_upload_dir_without_period_does_not_sync() {
        let dir = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        let mut trial = Trial::new(
            TrialConfig::builder()
                .log_dir(dir.path())
                .upload_dir(remote.path())
                .init_logging(false)
                .build(),
        );
        trial.start().unwrap();
        assert!(trial.sync_state().is_none());
        trial.close().unwrap();
        assert!(!remote.path().join(trial.trial_id()).exists());
    }

    #[test]
    fn test_upload_dir_with_period_mirrors_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        let mut trial = Trial::new(
            TrialConfig::builder()
                .log_dir(dir.path())
                .upload_dir(remote.path())
                .sync_period(Duration::from_secs(3600))
                .init_logging(false)
                .build(),
        );
        trial.start().unwrap();
        trial.metric(None, [("loss", 1.0)]).unwrap();
        trial.save(&"weights".to_string(), "model", Some(0)).unwrap();
        trial.close().unwrap();

        let mirrored = remote.path().join(trial.trial_id());
        for rel in [TRIAL_FILE, PARAMS_FILE, metrics::METRICS_FILE, "artifacts/model/0.json"] {
            assert!(mirrored.join(rel).exists(), "{rel} not mirrored");
        }
        let record: TrialRecord = storage::read_json(&mirrored.join(TRIAL_FILE)).unwrap();
        assert_eq!(record.state(), TrialState::Closed);
        assert!(!mirrored.join(crate::sync::SYNC_DIR).exists());
    }
}
