//! Experiment Tracking Schema
//!
//! The records a trial persists in its directory.
//!
//! ## Schema Overview
//!
//! ```text
//! TrialRecord (trial.json)
//!      │
//!      ├── ParamMap (params.json) [write-once]
//!      ├──< MetricRecord (metrics.jsonl) [append-only]
//!      └──< ArtifactRecord (artifacts.jsonl) [append-only manifest]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use track_ml::experiment::{MetricRecord, ParamMap, TrialRecord, TrialState};
//!
//! let params = ParamMap::new().with("lr", 0.01);
//! let mut record = TrialRecord::new("run-1a2b3c4d", "run-");
//! record.start();
//! assert_eq!(record.state(), TrialState::Started);
//!
//! let metric = MetricRecord::builder(0).field("loss", 0.5).build();
//! assert_eq!(metric.iteration(), 0);
//! # let _ = params;
//! ```

mod artifact_record;
mod metric_record;
mod params;
mod trial_record;

pub use artifact_record::{ArtifactRecord, ArtifactVersion};
pub use metric_record::{Fields, MetricRecord, MetricRecordBuilder, MetricValue};
pub use params::ParamMap;
pub use trial_record::{TrialRecord, TrialState};
