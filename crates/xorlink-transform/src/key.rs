use std::fmt;
use std::sync::Arc;

use crate::error::{Result, TransformError};

/// Shared key used by both peers unless configured otherwise.
pub const DEFAULT_KEY: &[u8] = b"MY_SECRET_KEY";

/// A validated, non-empty transform key.
///
/// Immutable after construction and cheap to clone, so a single key can be
/// read concurrently by every connection thread without synchronization.
#[derive(Clone, PartialEq, Eq)]
pub struct Key {
    bytes: Arc<[u8]>,
}

impl Key {
    /// Build a key, rejecting empty input.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(TransformError::EmptyKey);
        }
        Ok(Self {
            bytes: Arc::from(bytes),
        })
    }

    /// Apply the transform to `buffer` in place.
    pub fn apply(&self, buffer: &mut [u8]) -> Result<()> {
        crate::transform(buffer, &self.bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Key length in bytes. Never zero.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always `false`; present for API symmetry with slices.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Default for Key {
    fn default() -> Self {
        Self {
            bytes: Arc::from(DEFAULT_KEY),
        }
    }
}

impl TryFrom<&str> for Key {
    type Error = TransformError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value.as_bytes())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("len", &self.bytes.len())
            .field("bytes", &"<redacted>")
            .finish()
    }
}
