//! # track-ml: Per-Process Experiment Tracking
//!
//! track-ml records the parameters, metrics and checkpoints of a
//! machine-learning run into a local trial directory, and optionally
//! mirrors that directory to an upload location on a schedule.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Jidoka**: the metric ledger is append-only and never rewritten
//! - **Poka-Yoke safety**: one process trial, enforced by a guarded slot
//! - **Heijunka**: syncing runs on its own thread and never blocks training
//! - **Genchi Genbutsu**: plain JSON files you can inspect with `cat`
//!
//! ## Directory Layout
//!
//! ```text
//! <log_dir>/<trial_prefix><id>/
//!     trial.json          lifecycle record
//!     params.json         write-once parameters
//!     metrics.jsonl       append-only metric ledger
//!     artifacts.jsonl     append-only artifact manifest
//!     artifacts/<name>/<iteration|latest>.<ext>
//!     .sync/state.json    sync marker (never mirrored)
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use track_ml::{ParamMap, TrialConfig};
//!
//! track_ml::init(
//!     TrialConfig::builder()
//!         .log_dir("/tmp/runs")
//!         .upload_dir("/mnt/shared/runs")
//!         .sync_period(Duration::from_secs(60))
//!         .trial_prefix("resnet-")
//!         .param_map(ParamMap::new().with("lr", 0.001))
//!         .build(),
//! )?;
//!
//! for epoch in 0..10_u64 {
//!     track_ml::metric(Some(epoch), [("loss", 1.0 / (epoch as f64 + 1.0))])?;
//! }
//! track_ml::save(&vec![0.25_f32; 4], "weights", Some(9))?;
//! let weights: Vec<f32> = track_ml::load("weights", Some(9))?;
//!
//! track_ml::shutdown()?;
//! # Ok::<(), track_ml::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod artifacts;
pub mod config;
mod context;
pub mod error;
pub mod experiment;
pub mod logging;
pub mod metrics;
pub mod project;
pub mod reporter;
mod storage;
pub mod sync;
pub mod trial;

pub use artifacts::{ArtifactStore, BytesSerializer, JsonSerializer, Serializer};
pub use config::{TrialConfig, TrialConfigBuilder};
pub use context::{
    init, is_initialized, load, load_with, metric, save, save_with, shutdown, trial_dir, trial_id,
    with_trial,
};
pub use error::{Error, Result};
pub use experiment::{ArtifactVersion, Fields, MetricRecord, MetricValue, ParamMap, TrialState};
pub use metrics::MetricLog;
pub use project::Project;
pub use reporter::MetricSink;
pub use sync::{LocalMirror, Remote, SyncAgent};
pub use trial::Trial;
