//! Trial Record - lifecycle metadata persisted as `trial.json`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialState {
    /// Trial is constructed but its directory does not exist yet.
    Created,
    /// Trial directory exists and data operations are accepted.
    Started,
    /// Trial was closed; terminal.
    Closed,
}

/// Trial Record describes a single trial directory.
///
/// It is rewritten on every lifecycle transition so a reader (see
/// [`crate::project::Project`]) can tell running trials from finished ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrialRecord {
    trial_id: String,
    trial_prefix: String,
    state: TrialState,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
}

impl TrialRecord {
    /// Create a new trial record in `Created` state.
    ///
    /// # Arguments
    ///
    /// * `trial_id` - Unique identifier (also the directory name)
    /// * `trial_prefix` - Prefix the identifier was derived from
    #[must_use]
    pub fn new(trial_id: impl Into<String>, trial_prefix: impl Into<String>) -> Self {
        Self {
            trial_id: trial_id.into(),
            trial_prefix: trial_prefix.into(),
            state: TrialState::Created,
            created_at: Utc::now(),
            started_at: None,
            closed_at: None,
        }
    }

    /// Get the trial ID.
    #[must_use]
    pub fn trial_id(&self) -> &str {
        &self.trial_id
    }

    /// Get the prefix the trial was named with.
    #[must_use]
    pub fn trial_prefix(&self) -> &str {
        &self.trial_prefix
    }

    /// Get the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> TrialState {
        self.state
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the start timestamp, if the trial has started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get the close timestamp, if the trial was closed.
    #[must_use]
    pub const fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    /// Transition `Created` → `Started`, stamping `started_at`.
    pub fn start(&mut self) {
        self.state = TrialState::Started;
        self.started_at = Some(Utc::now());
    }

    /// Transition to `Closed`, stamping `closed_at`.
    pub fn close(&mut self) {
        self.state = TrialState::Closed;
        self.closed_at = Some(Utc::now());
    }
}
