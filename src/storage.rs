//! Filesystem helpers shared by the ledger, the artifact store and the sync agent.
//!
//! Every whole-file write goes through [`write_atomic`]: bytes land in a
//! hidden temp sibling and are renamed into place, so a concurrent reader
//! sees either the previous file or the complete new one.

use std::fs;
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::{Error, Result};

/// Suffix of in-flight temp files.
pub(crate) const TEMP_SUFFIX: &str = ".tmp";

/// Create `path` and its parents, mapping failures to [`Error::Directory`].
pub(crate) fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| Error::Directory {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `bytes` to `path` via temp file + rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    let tmp = temp_sibling(path);
    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result.map_err(Error::from)
}

/// Serialize `value` as pretty JSON and write it atomically.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes)
}

/// Read a JSON document, mapping parse failures to [`Error::Ledger`].
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = read_existing(path)?;
    serde_json::from_slice(&bytes).map_err(|source| Error::Ledger {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a file, mapping a missing file to [`Error::NotFound`].
pub(crate) fn read_existing(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
        _ => Error::Io(err),
    })
}

/// Append one JSON value as a single line and flush it.
pub(crate) fn append_json_line<T: Serialize>(file: &mut fs::File, value: &T) -> Result<()> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    file.write_all(&line)?;
    file.flush()?;
    Ok(())
}

/// Read a JSON-lines file in order.
///
/// A missing file is an empty ledger. A torn final line (crash during
/// append) is skipped; a malformed line anywhere else is an error.
pub(crate) fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    let lines: Vec<String> = BufReader::new(file).lines().collect::<std::io::Result<_>>()?;
    let last = lines.len().saturating_sub(1);
    let mut records = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(record) => records.push(record),
            Err(err) if idx == last => {
                warn!(path = %path.display(), %err, "skipping torn trailing ledger line");
            }
            Err(source) => {
                return Err(Error::Ledger {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }
    Ok(records)
}

/// Make a JSON-lines file safe to append to after a crash mid-append.
///
/// An unterminated final line that still parses gets its newline; one that
/// does not parse is truncated back to the last complete line. Returns
/// whether the file was changed.
pub(crate) fn repair_tail(path: &Path) -> Result<bool> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err.into()),
    };
    if bytes.last().map_or(true, |&b| b == b'\n') {
        return Ok(false);
    }
    let line_start = bytes.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
    let tail = &bytes[line_start..];
    let mut file = fs::OpenOptions::new().write(true).open(path)?;
    if serde_json::from_slice::<serde_json::Value>(tail).is_ok() {
        file.seek(SeekFrom::End(0))?;
        file.write_all(b"\n")?;
        warn!(path = %path.display(), "terminated unterminated ledger line");
    } else {
        file.set_len(line_start as u64)?;
        warn!(path = %path.display(), dropped_bytes = tail.len(), "truncated torn ledger line");
    }
    file.sync_all()?;
    Ok(true)
}

/// Lowercase hex sha256 of `bytes`.
pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hidden entries and temp files are never mirrored or listed.
pub(crate) fn is_internal(name: &str) -> bool {
    name.starts_with('.') || name.ends_with(TEMP_SUFFIX)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}{TEMP_SUFFIX}"))
}
