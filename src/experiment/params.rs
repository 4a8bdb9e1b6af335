//! Param Map - immutable run parameters written once per trial

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Run parameters (hyperparameters, dataset names, seeds).
///
/// The map is frozen once handed to a trial; `persist` refuses to
/// replace an existing params file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ParamMap(BTreeMap<String, Value>);

impl ParamMap {
    /// Create an empty param map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, returning the extended map.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Get a parameter value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Write the map to `path`, failing if the file already exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] with kind `AlreadyExists` when params were
    /// already persisted, or any other IO failure.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        Ok(())
    }

    /// Read a persisted param map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the file is missing or
    /// [`Error::Ledger`] if it is not valid JSON.
    pub fn read(path: &Path) -> Result<Self> {
        crate::storage::read_json(path)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ParamMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<BTreeMap<String, Value>> for ParamMap {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for ParamMap {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}
