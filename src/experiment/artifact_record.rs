//! Artifact Record - manifest entry for a saved artifact

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version slot of an artifact: a numbered iteration or the mutable `latest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactVersion {
    /// Write-once checkpoint for a given iteration.
    Iteration(u64),
    /// Mutable slot replaced on every save.
    Latest,
}

impl ArtifactVersion {
    /// Map an optional iteration to a version slot.
    #[must_use]
    pub const fn from_iteration(iteration: Option<u64>) -> Self {
        match iteration {
            Some(i) => Self::Iteration(i),
            None => Self::Latest,
        }
    }

    /// File stem used on disk (`"12"` or `"latest"`).
    #[must_use]
    pub fn file_stem(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ArtifactVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iteration(i) => write!(f, "{i}"),
            Self::Latest => f.write_str("latest"),
        }
    }
}

/// Artifact Record represents one save of an artifact.
///
/// ## Hash Format
///
/// `sha256` holds the lowercase hex digest of the serialized payload,
/// the same digest the sync agent uses for change detection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    obj_name: String,
    version: ArtifactVersion,
    serializer: String,
    sha256: String,
    size_bytes: u64,
    created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Create a new artifact record stamped with the current time.
    #[must_use]
    pub fn new(
        obj_name: impl Into<String>,
        version: ArtifactVersion,
        serializer: impl Into<String>,
        sha256: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            obj_name: obj_name.into(),
            version,
            serializer: serializer.into(),
            sha256: sha256.into(),
            size_bytes,
            created_at: Utc::now(),
        }
    }

    /// Get the artifact name.
    #[must_use]
    pub fn obj_name(&self) -> &str {
        &self.obj_name
    }

    /// Get the version slot.
    #[must_use]
    pub const fn version(&self) -> ArtifactVersion {
        self.version
    }

    /// Get the serializer identifier.
    #[must_use]
    pub fn serializer(&self) -> &str {
        &self.serializer
    }

    /// Get the payload digest.
    #[must_use]
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Get the payload size in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
