//! Artifact Store - versioned checkpoints under `<trial_dir>/artifacts/`
//!
//! ## Layout
//!
//! ```text
//! artifacts/<obj_name>/<iteration>.<ext>   write-once checkpoint
//! artifacts/<obj_name>/latest.<ext>        mutable slot
//! artifacts.jsonl                          append-only manifest
//! ```
//!
//! Payloads are written with temp file + rename, so the sync agent and
//! readers never observe a half-written checkpoint.

mod serializer;

pub use serializer::{BytesSerializer, JsonSerializer, Serializer};

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::experiment::{ArtifactRecord, ArtifactVersion};
use crate::storage;
use crate::{Error, Result};

/// Directory holding artifact payloads.
pub const ARTIFACTS_DIR: &str = "artifacts";
/// Manifest of every save.
pub const MANIFEST_FILE: &str = "artifacts.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Overwrite {
    Forbid,
    Replace,
}

/// Versioned artifact storage for one trial.
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    manifest_path: PathBuf,
    manifest: File,
}

impl ArtifactStore {
    /// Open the store rooted at `trial_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifacts directory or manifest cannot be created.
    pub fn open(trial_dir: &Path) -> Result<Self> {
        let root = trial_dir.join(ARTIFACTS_DIR);
        storage::create_dir(&root)?;
        let manifest_path = trial_dir.join(MANIFEST_FILE);
        storage::repair_tail(&manifest_path)?;
        let manifest = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&manifest_path)?;
        Ok(Self {
            root,
            manifest_path,
            manifest,
        })
    }

    /// Root directory of artifact payloads.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path an artifact version would occupy for a given serializer extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] for names that are not a single
    /// visible path component, or for an extension that would make the
    /// file look like a temp file or span more than one component.
    pub fn path_for(&self, obj_name: &str, version: ArtifactVersion, extension: &str) -> Result<PathBuf> {
        validate_name(obj_name)?;
        let file_name = format!("{}.{extension}", version.file_stem());
        let valid_ext = !extension.is_empty()
            && !extension.contains(['/', '\\', '.'])
            && !storage::is_internal(&file_name);
        if !valid_ext {
            return Err(Error::InvalidName(extension.to_string()));
        }
        Ok(self.root.join(obj_name).join(file_name))
    }

    /// Save `obj` under `(obj_name, iteration)`.
    ///
    /// `iteration: None` writes the `latest` slot, which is replaced on
    /// every save. Numbered versions are write-once; use
    /// [`ArtifactStore::overwrite`] to replace one on purpose.
    ///
    /// # Errors
    ///
    /// [`Error::Serialization`] if encoding fails (nothing is written),
    /// [`Error::ArtifactExists`] for an existing numbered version,
    /// [`Error::InvalidName`], or an IO error.
    pub fn save<T, S>(
        &mut self,
        obj: &T,
        obj_name: &str,
        iteration: Option<u64>,
        serializer: &S,
    ) -> Result<PathBuf>
    where
        S: Serializer<T> + ?Sized,
    {
        self.write(obj, obj_name, iteration, serializer, Overwrite::Forbid)
    }

    /// Save `obj`, replacing an existing numbered version if present.
    ///
    /// # Errors
    ///
    /// Same as [`ArtifactStore::save`] minus [`Error::ArtifactExists`].
    pub fn overwrite<T, S>(
        &mut self,
        obj: &T,
        obj_name: &str,
        iteration: Option<u64>,
        serializer: &S,
    ) -> Result<PathBuf>
    where
        S: Serializer<T> + ?Sized,
    {
        self.write(obj, obj_name, iteration, serializer, Overwrite::Replace)
    }

    fn write<T, S>(
        &mut self,
        obj: &T,
        obj_name: &str,
        iteration: Option<u64>,
        serializer: &S,
        policy: Overwrite,
    ) -> Result<PathBuf>
    where
        S: Serializer<T> + ?Sized,
    {
        let version = ArtifactVersion::from_iteration(iteration);
        let path = self.path_for(obj_name, version, serializer.extension())?;
        let existing = self.version_files(obj_name, version)?;
        if policy == Overwrite::Forbid && version != ArtifactVersion::Latest && !existing.is_empty() {
            return Err(Error::ArtifactExists {
                obj_name: obj_name.to_string(),
                version: version.to_string(),
            });
        }

        let bytes = serializer
            .encode(obj)
            .map_err(|source| Error::Serialization {
                obj_name: obj_name.to_string(),
                serializer: serializer.id(),
                source,
            })?;
        storage::write_atomic(&path, &bytes)?;
        for stale in existing.iter().filter(|p| **p != path) {
            fs::remove_file(stale)?;
        }

        let record = ArtifactRecord::new(
            obj_name,
            version,
            serializer.id(),
            storage::sha256_hex(&bytes),
            bytes.len() as u64,
        );
        storage::append_json_line(&mut self.manifest, &record)?;
        debug!(obj_name, %version, size = bytes.len(), "artifact saved");
        Ok(path)
    }

    /// Load `(obj_name, iteration)`.
    ///
    /// `iteration: None` reads the `latest` slot, falling back to the
    /// highest numbered version written with the same serializer.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if no such artifact exists (no file is
    /// created), [`Error::Deserialization`] if decoding fails.
    pub fn load<T, S>(&self, obj_name: &str, iteration: Option<u64>, serializer: &S) -> Result<T>
    where
        S: Serializer<T> + ?Sized,
    {
        let ext = serializer.extension();
        let version = match iteration {
            Some(i) => ArtifactVersion::Iteration(i),
            None => self.resolve_latest(obj_name, ext)?,
        };
        let path = self.path_for(obj_name, version, ext)?;
        let bytes = storage::read_existing(&path).map_err(|err| match err {
            Error::NotFound(_) => not_found(obj_name, version),
            other => other,
        })?;
        serializer
            .decode(&bytes)
            .map_err(|source| Error::Deserialization {
                obj_name: obj_name.to_string(),
                serializer: serializer.id(),
                source,
            })
    }

    /// Numbered versions saved for `obj_name`, ascending, any serializer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] or an IO error.
    pub fn versions(&self, obj_name: &str) -> Result<Vec<u64>> {
        self.numbered_versions(obj_name, None)
    }

    /// Manifest entries in save order.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be read.
    pub fn records(&self) -> Result<Vec<ArtifactRecord>> {
        storage::read_json_lines(&self.manifest_path)
    }

    fn resolve_latest(&self, obj_name: &str, ext: &str) -> Result<ArtifactVersion> {
        if self.path_for(obj_name, ArtifactVersion::Latest, ext)?.exists() {
            return Ok(ArtifactVersion::Latest);
        }
        self.numbered_versions(obj_name, Some(ext))?
            .last()
            .map(|&i| ArtifactVersion::Iteration(i))
            .ok_or_else(|| not_found(obj_name, ArtifactVersion::Latest))
    }

    /// Files holding `version` of `obj_name`, whatever serializer wrote them.
    fn version_files(&self, obj_name: &str, version: ArtifactVersion) -> Result<Vec<PathBuf>> {
        validate_name(obj_name)?;
        let stem = version.file_stem();
        let entries = match fs::read_dir(self.root.join(obj_name)) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let visible = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !storage::is_internal(n));
            if visible && path.file_stem().and_then(|s| s.to_str()) == Some(stem.as_str()) {
                files.push(path);
            }
        }
        Ok(files)
    }

    fn numbered_versions(&self, obj_name: &str, ext: Option<&str>) -> Result<Vec<u64>> {
        validate_name(obj_name)?;
        let dir = self.root.join(obj_name);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut versions = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if ext.is_some_and(|e| path.extension().and_then(|x| x.to_str()) != Some(e)) {
                continue;
            }
            if let Some(i) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            {
                versions.push(i);
            }
        }
        versions.sort_unstable();
        versions.dedup();
        Ok(versions)
    }
}

fn not_found(obj_name: &str, version: ArtifactVersion) -> Error {
    Error::NotFound(format!("artifact '{obj_name}' version {version}"))
}

fn validate_name(obj_name: &str) -> Result<()> {
    let valid = !obj_name.is_empty()
        && !obj_name.starts_with('.')
        && !obj_name.contains(['/', '\\'])
        && !storage::is_internal(obj_name);
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName(obj_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Checkpoint {
        weights: Vec<f32>,
        epoch: u32,
    }

    fn open_tmp() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_save_load_numbered() {
        let (_dir, mut store) = open_tmp();
        let ckpt = Checkpoint { weights: vec![0.5, -1.25], epoch: 3 };
        let path = store.save(&ckpt, "model", Some(3), &JsonSerializer).unwrap();
        assert!(path.ends_with("artifacts/model/3.json"));
        let back: Checkpoint = store.load("model", Some(3), &JsonSerializer).unwrap();
        assert_eq!(back, ckpt);
    }

    #[test]
    fn test_numbered_version_is_write_once() {
        let (_dir, mut store) = open_tmp();
        store.save(&1_u32, "step", Some(0), &JsonSerializer).unwrap();
        let err = store.save(&2_u32, "step", Some(0), &JsonSerializer).unwrap_err();
        assert!(matches!(err, Error::ArtifactExists { .. }));

        store.overwrite(&2_u32, "step", Some(0), &JsonSerializer).unwrap();
        let back: u32 = store.load("step", Some(0), &JsonSerializer).unwrap();
        assert_eq!(back, 2);
    }

    #[test]
    fn test_write_once_holds_across_serializers() {
        let (dir, mut store) = open_tmp();
        store.save(&vec![1_u8, 2], "m", Some(0), &JsonSerializer).unwrap();
        let err = store.save(&vec![9_u8], "m", Some(0), &BytesSerializer).unwrap_err();
        assert!(matches!(err, Error::ArtifactExists { ref version, .. } if version == "0"));
        assert_eq!(store.records().unwrap().len(), 1);
        assert!(!dir.path().join(ARTIFACTS_DIR).join("m").join("0.bin").exists());
    }

    #[test]
    fn test_overwrite_with_other_serializer_replaces_version() {
        let (dir, mut store) = open_tmp();
        store.save(&vec![1_u8, 2], "m", Some(0), &JsonSerializer).unwrap();
        store.overwrite(&vec![9_u8], "m", Some(0), &BytesSerializer).unwrap();

        let version_dir = dir.path().join(ARTIFACTS_DIR).join("m");
        assert!(!version_dir.join("0.json").exists());
        assert_eq!(store.load::<Vec<u8>, _>("m", Some(0), &BytesSerializer).unwrap(), vec![9_u8]);
        assert!(matches!(
            store.load::<Vec<u8>, _>("m", Some(0), &JsonSerializer),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_temp_like_extension_rejected() {
        struct TmpSerializer;
        impl Serializer<Vec<u8>> for TmpSerializer {
            fn id(&self) -> &'static str {
                "tmp"
            }
            fn extension(&self) -> &'static str {
                "tmp"
            }
            fn encode(&self, value: &Vec<u8>) -> std::result::Result<Vec<u8>, crate::error::BoxError> {
                Ok(value.clone())
            }
            fn decode(&self, bytes: &[u8]) -> std::result::Result<Vec<u8>, crate::error::BoxError> {
                Ok(bytes.to_vec())
            }
        }

        let (dir, mut store) = open_tmp();
        let err = store.save(&vec![1_u8], "weights", Some(0), &TmpSerializer).unwrap_err();
        assert!(matches!(err, Error::InvalidName(ref ext) if ext == "tmp"));
        assert!(!dir.path().join(ARTIFACTS_DIR).join("weights").exists());
        for ext in ["", "a/b", "tar.gz"] {
            assert!(matches!(
                store.path_for("weights", ArtifactVersion::Latest, ext),
                Err(Error::InvalidName(_))
            ));
        }
    }

    #[test]
    fn test_latest_slot_is_replaced() {
        let (_dir, mut store) = open_tmp();
        store.save(&"a".to_string(), "note", None, &JsonSerializer).unwrap();
        store.save(&"b".to_string(), "note", None, &JsonSerializer).unwrap();
        let back: String = store.load("note", None, &JsonSerializer).unwrap();
        assert_eq!(back, "b");
    }

    #[test]
    fn test_load_none_falls_back_to_highest_iteration() {
        let (_dir, mut store) = open_tmp();
        for i in [2_u64, 10, 7] {
            store.save(&i, "ckpt", Some(i), &JsonSerializer).unwrap();
        }
        let back: u64 = store.load("ckpt", None, &JsonSerializer).unwrap();
        assert_eq!(back, 10);
        assert_eq!(store.versions("ckpt").unwrap(), vec![2, 7, 10]);
    }

    #[test]
    fn test_missing_artifact_creates_nothing() {
        let (dir, store) = open_tmp();
        let err = store.load::<u32, _>("missing", Some(1), &JsonSerializer).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(!dir.path().join(ARTIFACTS_DIR).join("missing").exists());
        let err = store.load::<u32, _>("missing", None, &JsonSerializer).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_decode_failure_is_deserialization_error() {
        let (_dir, mut store) = open_tmp();
        store.save(&"text".to_string(), "blob", Some(0), &JsonSerializer).unwrap();
        let err = store.load::<Vec<u64>, _>("blob", Some(0), &JsonSerializer).unwrap_err();
        assert!(matches!(err, Error::Deserialization { serializer: "json", .. }));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let (_dir, mut store) = open_tmp();
        for name in ["", ".", "..", "a/b", ".hidden", "x.tmp"] {
            let err = store.save(&0_u8, name, None, &JsonSerializer).unwrap_err();
            assert!(matches!(err, Error::InvalidName(_)), "{name:?}");
        }
    }

    #[test]
    fn test_manifest_records_every_save() {
        let (_dir, mut store) = open_tmp();
        store.save(&vec![1_u8, 2, 3], "weights", Some(0), &BytesSerializer).unwrap();
        store.save(&vec![4_u8], "weights", None, &BytesSerializer).unwrap();
        let records = store.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].version(), ArtifactVersion::Iteration(0));
        assert_eq!(records[0].serializer(), "bytes");
        assert_eq!(records[0].size_bytes(), 3);
        assert_eq!(records[1].version(), ArtifactVersion::Latest);
    }
}
