use std::fmt;
use std::sync::Arc;

use crate::codec::{Codec, CodecError};

/// Payload state of a document.
///
/// Stored bytes stay untouched until the first `read`/`write`; after that the
/// decoded value is cached next to the last serialized form.
enum PayloadState<T> {
    Unloaded(Option<Vec<u8>>),
    Loaded {
        value: Option<T>,
        bytes: Option<Vec<u8>>,
        dirty: bool,
    },
}

/// A document record: immutable id, optimistic-lock version and a lazily
/// materialized payload.
///
/// Views embed a `Document` the same way aggregates embed an entity; the
/// session only ever talks to this part of a view.
pub struct Document<T> {
    id: String,
    version: u64,
    state: PayloadState<T>,
    codec: Option<Arc<dyn Codec<T>>>,
}

impl<T> Document<T> {
    /// A new record carrying `payload`. Starts at version 0 and dirty, so the
    /// first flush serializes it.
    pub fn new(id: impl Into<String>, payload: T) -> Self {
        Document {
            id: id.into(),
            version: 0,
            state: PayloadState::Loaded {
                value: Some(payload),
                bytes: None,
                dirty: true,
            },
            codec: None,
        }
    }

    /// A new record without a payload.
    pub fn with_id(id: impl Into<String>) -> Self {
        Document {
            id: id.into(),
            version: 0,
            state: PayloadState::Loaded {
                value: None,
                bytes: None,
                dirty: false,
            },
            codec: None,
        }
    }

    /// A record rebuilt from storage. The payload is decoded on first access.
    pub fn stored(
        id: impl Into<String>,
        version: u64,
        bytes: Option<Vec<u8>>,
        codec: Arc<dyn Codec<T>>,
    ) -> Self {
        Document {
            id: id.into(),
            version,
            state: PayloadState::Unloaded(bytes),
            codec: Some(codec),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn has_codec(&self) -> bool {
        self.codec.is_some()
    }

    /// Attach the codec used to decode and encode the payload.
    pub fn attach_codec(&mut self, codec: Arc<dyn Codec<T>>) {
        self.codec = Some(codec);
    }

    /// True once the payload has been written and not yet flushed.
    pub fn is_dirty(&self) -> bool {
        matches!(self.state, PayloadState::Loaded { dirty: true, .. })
    }

    /// True once the payload has been decoded (or was set in memory).
    pub fn is_materialized(&self) -> bool {
        matches!(self.state, PayloadState::Loaded { .. })
    }

    /// Borrow the payload, decoding the stored bytes on first call.
    pub fn read(&mut self) -> Result<Option<&T>, CodecError> {
        self.materialize()?;
        match &self.state {
            PayloadState::Loaded { value, .. } => Ok(value.as_ref()),
            PayloadState::Unloaded(_) => Ok(None),
        }
    }

    /// Borrow the payload for in-place mutation and mark the document dirty.
    pub fn write(&mut self) -> Result<Option<&mut T>, CodecError> {
        self.materialize()?;
        match &mut self.state {
            PayloadState::Loaded { value, dirty, .. } => {
                *dirty = true;
                Ok(value.as_mut())
            }
            PayloadState::Unloaded(_) => Ok(None),
        }
    }

    /// Replace the payload wholesale and mark the document dirty.
    pub fn set(&mut self, payload: T) {
        let bytes = match std::mem::replace(&mut self.state, PayloadState::Unloaded(None)) {
            PayloadState::Loaded { bytes, .. } => bytes,
            PayloadState::Unloaded(bytes) => bytes,
        };
        self.state = PayloadState::Loaded {
            value: Some(payload),
            bytes,
            dirty: true,
        };
    }

    /// The serialized payload as it should be written to storage.
    ///
    /// A dirty payload is re-encoded on every call and stays dirty; only a
    /// successful flush clears the flag. An absent payload serializes to `None`.
    pub fn serialize(&mut self) -> Result<Option<Vec<u8>>, CodecError> {
        let codec = self.codec.clone();
        match &mut self.state {
            PayloadState::Unloaded(bytes) => Ok(bytes.clone()),
            PayloadState::Loaded {
                value,
                bytes,
                dirty,
            } => {
                if *dirty {
                    *bytes = match value {
                        Some(value) => {
                            let codec = codec
                                .as_ref()
                                .ok_or_else(|| CodecError::MissingCodec(self.id.clone()))?;
                            Some(codec.encode(value)?)
                        }
                        None => None,
                    };
                    tracing::trace!(
                        target: "view_cache::document",
                        id = %self.id,
                        "payload serialized"
                    );
                }
                Ok(bytes.clone())
            }
        }
    }

    pub(crate) fn mark_flushed(&mut self) {
        if let PayloadState::Loaded { dirty, .. } = &mut self.state {
            *dirty = false;
        }
    }

    fn materialize(&mut self) -> Result<(), CodecError> {
        if let PayloadState::Unloaded(stored) = &self.state {
            let value = match stored {
                Some(bytes) => {
                    let codec = self
                        .codec
                        .as_ref()
                        .ok_or_else(|| CodecError::MissingCodec(self.id.clone()))?;
                    Some(codec.decode(bytes)?)
                }
                None => None,
            };
            let bytes = match std::mem::replace(&mut self.state, PayloadState::Unloaded(None)) {
                PayloadState::Unloaded(bytes) => bytes,
                PayloadState::Loaded { bytes, .. } => bytes,
            };
            self.state = PayloadState::Loaded {
                value,
                bytes,
                dirty: false,
            };
        }
        Ok(())
    }
}

impl<T> fmt::Debug for Document<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("materialized", &self.is_materialized())
            .field("dirty", &self.is_dirty())
            .field("codec", &self.has_codec())
            .finish()
    }
}
