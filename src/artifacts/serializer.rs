//! Serializer capability for artifacts.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::BoxError;

/// Encodes and decodes artifacts of type `T`.
///
/// A serializer is identified by `id` (recorded in the artifact manifest)
/// and names the payload file with its `extension`. One artifact version
/// holds a single payload whichever serializer wrote it.
pub trait Serializer<T> {
    /// Stable identifier stored in the manifest.
    fn id(&self) -> &'static str;

    /// File extension without the dot. Must be a single plain component
    /// (no `.` or separators) and must not be `tmp`.
    fn extension(&self) -> &'static str;

    /// Encode `value` to bytes.
    ///
    /// # Errors
    ///
    /// Any codec failure; surfaced as [`crate::Error::Serialization`].
    fn encode(&self, value: &T) -> Result<Vec<u8>, BoxError>;

    /// Decode bytes produced by `encode`.
    ///
    /// # Errors
    ///
    /// Any codec failure; surfaced as [`crate::Error::Deserialization`].
    fn decode(&self, bytes: &[u8]) -> Result<T, BoxError>;
}

/// Default serializer: JSON via serde.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl<T: Serialize + DeserializeOwned> Serializer<T> for JsonSerializer {
    fn id(&self) -> &'static str {
        "json"
    }

    fn extension(&self) -> &'static str {
        "json"
    }

    fn encode(&self, value: &T) -> Result<Vec<u8>, BoxError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, BoxError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Stores raw bytes unchanged (model weights already in their own format).
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesSerializer;

impl Serializer<Vec<u8>> for BytesSerializer {
    fn id(&self) -> &'static str {
        "bytes"
    }

    fn extension(&self) -> &'static str {
        "bin"
    }

    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>, BoxError> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, BoxError> {
        Ok(bytes.to_vec())
    }
}
