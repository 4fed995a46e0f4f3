//! Event payload: the exact bytes read from `--file`.
//!
//! The file is read once and validated as JSON; the buffer is then shared by the signer and the
//! request body so the signature always covers the bytes on the wire.

use std::path::Path;

use bytes::Bytes;
use serde::de::IgnoredAny;

use crate::error::PayloadError;

/// Immutable, JSON-validated event bytes. Cloning is cheap (reference counted).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventPayload {
    bytes: Bytes,
}

impl EventPayload {
    /// Validates `bytes` as a JSON document without re-encoding it.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self, PayloadError> {
        let bytes = bytes.into();
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(PayloadError::Empty);
        }
        serde_json::from_slice::<IgnoredAny>(&bytes)?;
        Ok(Self { bytes })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PayloadError> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|source| PayloadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(content)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the same buffer, for the request body.
    pub fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
