//! Process context: at most one installed [`Trial`] per process.
//!
//! The slot is a `Mutex<Option<Trial>>`. `init` and `shutdown` are its only
//! mutators; the free functions lock it for the duration of one call and
//! delegate to the installed trial. Code that wants several trials at once
//! should hold [`Trial`] values directly instead of using this module.
//!
//! A reporter runs while the slot is locked, so it must not call back
//! into these free functions.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::artifacts::Serializer;
use crate::config::TrialConfig;
use crate::experiment::{MetricRecord, MetricValue};
use crate::trial::Trial;
use crate::{Error, Result};

static ACTIVE: Mutex<Option<Trial>> = Mutex::new(None);

fn slot() -> MutexGuard<'static, Option<Trial>> {
    ACTIVE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Create, start and install the process trial.
///
/// Nothing is installed if the trial fails to start.
///
/// # Errors
///
/// [`Error::AlreadyInitialized`] if a trial is installed; any
/// [`Trial::start`] error.
pub fn init(config: TrialConfig) -> Result<()> {
    let mut slot = slot();
    if slot.is_some() {
        return Err(Error::AlreadyInitialized);
    }
    let mut trial = Trial::new(config);
    trial.start()?;
    debug!(trial_id = %trial.trial_id(), "trial installed");
    *slot = Some(trial);
    Ok(())
}

/// Close the process trial and clear the slot.
///
/// The slot is cleared even if closing fails.
///
/// # Errors
///
/// [`Error::NotInitialized`] if no trial is installed; any
/// [`Trial::close`] error, including a failed final sync.
pub fn shutdown() -> Result<()> {
    let mut slot = slot();
    let mut trial = slot.take().ok_or(Error::NotInitialized)?;
    debug!(trial_id = %trial.trial_id(), "trial uninstalled");
    trial.close()
}

/// Whether a trial is installed.
#[must_use]
pub fn is_initialized() -> bool {
    slot().is_some()
}

/// Run `f` against the installed trial.
///
/// # Errors
///
/// [`Error::NotInitialized`] if no trial is installed, or the error of `f`.
pub fn with_trial<R>(f: impl FnOnce(&mut Trial) -> Result<R>) -> Result<R> {
    let mut slot = slot();
    let trial = slot.as_mut().ok_or(Error::NotInitialized)?;
    f(trial)
}

/// [`Trial::metric`] on the installed trial.
///
/// ```rust,no_run
/// track_ml::init(track_ml::TrialConfig::default())?;
/// track_ml::metric(Some(1), [("loss", 0.5), ("acc", 0.8)])?;
/// track_ml::shutdown()?;
/// # Ok::<(), track_ml::Error>(())
/// ```
///
/// # Errors
///
/// [`Error::NotInitialized`], or any [`Trial::metric`] error.
pub fn metric<I, K, V>(iteration: Option<u64>, fields: I) -> Result<MetricRecord>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: MetricValue,
{
    with_trial(|t| t.metric(iteration, fields))
}

/// [`Trial::save`] on the installed trial.
///
/// # Errors
///
/// [`Error::NotInitialized`], or any [`Trial::save`] error.
pub fn save<T: Serialize + DeserializeOwned>(obj: &T, obj_name: &str, iteration: Option<u64>) -> Result<PathBuf> {
    with_trial(|t| t.save(obj, obj_name, iteration))
}

/// [`Trial::save_with`] on the installed trial.
///
/// # Errors
///
/// [`Error::NotInitialized`], or any [`Trial::save_with`] error.
pub fn save_with<T, S>(obj: &T, obj_name: &str, iteration: Option<u64>, serializer: &S) -> Result<PathBuf>
where
    S: Serializer<T> + ?Sized,
{
    with_trial(|t| t.save_with(obj, obj_name, iteration, serializer))
}

/// [`Trial::load`] on the installed trial.
///
/// # Errors
///
/// [`Error::NotInitialized`], or any [`Trial::load`] error.
pub fn load<T: Serialize + DeserializeOwned>(obj_name: &str, iteration: Option<u64>) -> Result<T> {
    with_trial(|t| t.load(obj_name, iteration))
}

/// [`Trial::load_with`] on the installed trial.
///
/// # Errors
///
/// [`Error::NotInitialized`], or any [`Trial::load_with`] error.
pub fn load_with<T, S>(obj_name: &str, iteration: Option<u64>, serializer: &S) -> Result<T>
where
    S: Serializer<T> + ?Sized,
{
    with_trial(|t| t.load_with(obj_name, iteration, serializer))
}

/// Directory of the installed trial.
///
/// # Errors
///
/// [`Error::NotInitialized`] if no trial is installed.
pub fn trial_dir() -> Result<PathBuf> {
    with_trial(|t| Ok(t.trial_dir().to_path_buf()))
}

/// Identifier of the installed trial.
///
/// # Errors
///
/// [`Error::NotInitialized`] if no trial is installed.
pub fn trial_id() -> Result<String> {
    with_trial(|t| Ok(t.trial_id().to_string()))
}
