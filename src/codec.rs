//! Codecs - Payload (de)serialization for documents.
//!
//! A codec turns a document payload into the bytes stored in the data column
//! and back. The manager owns one shared codec per view kind and attaches it to
//! every document it hands out.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Error type for payload encoding and decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The payload could not be serialized.
    #[error("failed to serialize payload: {0}")]
    Encode(String),
    /// The stored bytes could not be deserialized.
    #[error("failed to deserialize payload: {0}")]
    Decode(String),
    /// The document needs a codec but none has been attached yet.
    #[error("no codec attached to document {0}")]
    MissingCodec(String),
}

/// Converts payloads to and from their stored byte form.
///
/// Repeated encodes of the same logical payload do not need to be
/// byte-identical; every flush simply re-issues whatever the codec produces.
pub trait Codec<T>: Send + Sync {
    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// JSON payloads via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T> Codec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// Compact binary payloads via `bitcode`.
#[cfg(feature = "bitcode")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BitcodeCodec;

#[cfg(feature = "bitcode")]
impl<T> Codec<T> for BitcodeCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        bitcode::serialize(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        bitcode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
