//! Error types for track-ml
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use std::path::PathBuf;

use thiserror::Error;

use crate::experiment::TrialState;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error produced by user-supplied codecs.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// track-ml error types
#[derive(Error, Debug)]
pub enum Error {
    /// `init` called while a trial is already installed in this process
    #[error("A trial already exists in the current process\nCall shutdown() before starting another one")]
    AlreadyInitialized,

    /// Free function called before `init` or after `shutdown`
    #[error("No trial exists in the current process\nCall init() first")]
    NotInitialized,

    /// Operation issued while the trial is not in the required state
    #[error("Invalid trial state: expected {expected:?}, found {actual:?}")]
    InvalidState {
        /// State the operation requires
        expected: TrialState,
        /// State the trial is actually in
        actual: TrialState,
    },

    /// Creating the log or trial directory failed
    #[error("Cannot create directory {path}: {source}")]
    Directory {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying IO failure
        #[source]
        source: std::io::Error,
    },

    /// Serializer rejected the object
    #[error("Failed to serialize '{obj_name}' with {serializer}: {source}")]
    Serialization {
        /// Artifact name
        obj_name: String,
        /// Serializer identifier
        serializer: &'static str,
        /// Codec failure
        #[source]
        source: BoxError,
    },

    /// Serializer could not decode stored bytes
    #[error("Failed to deserialize '{obj_name}' with {serializer}: {source}")]
    Deserialization {
        /// Artifact name
        obj_name: String,
        /// Serializer identifier
        serializer: &'static str,
        /// Codec failure
        #[source]
        source: BoxError,
    },

    /// No artifact (or trial) matches the lookup
    #[error("Not found: {0}")]
    NotFound(String),

    /// Numbered artifact version already written
    #[error("Artifact '{obj_name}' already has version {version}\nUse overwrite() to replace it explicitly")]
    ArtifactExists {
        /// Artifact name
        obj_name: String,
        /// Version that already exists
        version: String,
    },

    /// Artifact name, serializer extension or trial prefix is not a single
    /// visible path component
    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    /// Metric iteration went backwards
    #[error("Metric iteration {got} is lower than the last recorded iteration {last}")]
    NonMonotonicIteration {
        /// Last iteration in the ledger
        last: u64,
        /// Rejected iteration
        got: u64,
    },

    /// Final blocking sync failed during close
    #[error("Sync to {remote} failed: {source}\nLocal trial data is intact and can be re-synced")]
    Sync {
        /// Remote description
        remote: String,
        /// Error of the failed transfer or marker write
        #[source]
        source: Box<Error>,
    },

    /// Malformed JSON in a trial metadata file
    #[error("Malformed ledger file {path}: {source}")]
    Ledger {
        /// File that failed to parse
        path: PathBuf,
        /// Parse failure
        #[source]
        source: serde_json::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
