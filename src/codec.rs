//! Payload decoding for fetched resources

use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use thiserror::Error;

/// Errors that can occur when decoding or encoding a payload
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not valid JSON for the target type
    #[error("Failed to decode payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Turns raw payloads into values and values back into their cached form
pub trait Codec<T>: Send + Sync {
    /// Decodes a payload. `Ok(None)` means the payload carried no usable value.
    fn decode(&self, payload: &[u8]) -> Result<Option<T>, DecodeError>;

    /// Serializes a value for storage in the cache
    fn encode(&self, value: &T) -> Result<String, DecodeError>;
}

/// JSON codec for any serde type
///
/// A JSON `null` payload decodes to `None`.
pub struct JsonCodec<T>(PhantomData<fn() -> T>);

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<T> Codec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn decode(&self, payload: &[u8]) -> Result<Option<T>, DecodeError> {
        Ok(serde_json::from_slice::<Option<T>>(payload)?)
    }

    fn encode(&self, value: &T) -> Result<String, DecodeError> {
        Ok(serde_json::to_string(value)?)
    }
}
