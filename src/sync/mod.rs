//! Sync Agent - scheduled one-way mirror of a trial directory
//!
//! ## Algorithm
//!
//! Each tick walks the trial directory (skipping hidden entries and temp
//! files), reads every file whole, hashes it and compares the digest with
//! the committed marker. Changed files are sent one at a time; a file's
//! marker entry is committed only after `Remote::put` returned `Ok`. The
//! marker is persisted at the end of the tick, successful or not.
//!
//! A tick that fails halfway leaves the already-sent files committed and
//! the rest pending. The next tick re-reads the directory and sends only
//! what is still missing, so the remote ends up with every file exactly
//! once (at-least-once transfer, idempotent `put`).
//!
//! Background ticks never raise into the caller; failures are logged and
//! retried on the next period. [`SyncAgent::close`] runs a final blocking
//! tick and returns its error.

mod remote;
mod state;

pub use remote::{LocalMirror, Remote};
pub use state::SyncState;

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::storage;
use crate::{Error, Result};

/// Hidden folder holding the marker; never mirrored.
pub const SYNC_DIR: &str = ".sync";
const STATE_FILE: &str = "state.json";

/// Outcome of one successful tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Files sent to the remote.
    pub transferred: usize,
    /// Files already up to date.
    pub unchanged: usize,
}

struct SyncCore {
    trial_dir: PathBuf,
    state_path: PathBuf,
    state: SyncState,
    remote: Box<dyn Remote>,
}

impl SyncCore {
    fn tick(&mut self) -> Result<SyncReport> {
        self.state.begin_attempt();
        let outcome = self.transfer_changes();
        if outcome.is_ok() {
            self.state.finish_success();
        }
        self.state.save(&self.state_path)?;
        outcome
    }

    fn transfer_changes(&mut self) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        for (rel_path, abs_path) in snapshot_paths(&self.trial_dir)? {
            let bytes = match std::fs::read(&abs_path) {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            let digest = storage::sha256_hex(&bytes);
            if self.state.committed(&rel_path) == Some(digest.as_str()) {
                report.unchanged += 1;
                continue;
            }
            self.remote.put(&rel_path, &bytes)?;
            self.state.commit(rel_path, digest);
            report.transferred += 1;
        }
        Ok(report)
    }
}

/// Trial files eligible for mirroring, as `(relative, absolute)` pairs.
fn snapshot_paths(trial_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut paths = Vec::new();
    let walker = WalkDir::new(trial_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !storage::is_internal(&e.file_name().to_string_lossy()));
    for entry in walker {
        let entry = entry.map_err(|err| Error::Io(err.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(trial_dir) else {
            continue;
        };
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        paths.push((rel, entry.path().to_path_buf()));
    }
    Ok(paths)
}

fn lock(core: &Mutex<SyncCore>) -> MutexGuard<'_, SyncCore> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Periodic mirror of one trial directory to a [`Remote`].
pub struct SyncAgent {
    core: Arc<Mutex<SyncCore>>,
    remote_name: String,
    worker: Option<(Sender<()>, JoinHandle<()>)>,
}

impl SyncAgent {
    /// Create an idle agent for `trial_dir`, resuming any persisted marker.
    #[must_use]
    pub fn new(trial_dir: &Path, remote: Box<dyn Remote>) -> Self {
        let state_path = trial_dir.join(SYNC_DIR).join(STATE_FILE);
        let state = SyncState::load(&state_path);
        let remote_name = remote.describe();
        Self {
            core: Arc::new(Mutex::new(SyncCore {
                trial_dir: trial_dir.to_path_buf(),
                state_path,
                state,
                remote,
            })),
            remote_name,
            worker: None,
        }
    }

    /// Remote description.
    #[must_use]
    pub fn remote(&self) -> &str {
        &self.remote_name
    }

    /// Whether the background worker is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Snapshot of the marker.
    #[must_use]
    pub fn state(&self) -> SyncState {
        lock(&self.core).state.clone()
    }

    /// Start ticking every `period` on a background thread.
    ///
    /// Calling `start` on a running agent is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the thread cannot be spawned.
    pub fn start(&mut self, period: Duration) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let core = Arc::clone(&self.core);
        let remote = self.remote_name.clone();
        let handle = thread::Builder::new()
            .name("track-sync".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => match lock(&core).tick() {
                        Ok(report) => debug!(
                            %remote,
                            transferred = report.transferred,
                            unchanged = report.unchanged,
                            "sync tick"
                        ),
                        Err(err) => warn!(%remote, %err, "sync tick failed; retrying next period"),
                    },
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        info!(remote = %self.remote_name, period_ms = period.as_millis() as u64, "sync agent started");
        self.worker = Some((stop_tx, handle));
        Ok(())
    }

    /// Run one tick on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns the transfer or marker error of this tick.
    pub fn sync_now(&self) -> Result<SyncReport> {
        lock(&self.core).tick()
    }

    /// Stop the background worker, letting an in-flight tick finish.
    pub fn stop(&mut self) {
        if let Some((stop_tx, handle)) = self.worker.take() {
            let _ = stop_tx.send(());
            if handle.join().is_err() {
                warn!(remote = %self.remote_name, "sync worker panicked");
            }
            debug!(remote = %self.remote_name, "sync agent stopped");
        }
    }

    /// Stop the worker and run a final blocking sync.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sync`] if the final sync fails.
    pub fn close(mut self) -> Result<SyncReport> {
        self.stop();
        let report = self.sync_now().map_err(|err| Error::Sync {
            remote: self.remote_name.clone(),
            source: Box::new(err),
        })?;
        info!(
            remote = %self.remote_name,
            transferred = report.transferred,
            "final sync complete"
        );
        Ok(report)
    }
}

impl Drop for SyncAgent {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SyncAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncAgent")
            .field("remote", &self.remote_name)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
