/// Errors from container codecs.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("container truncated: status field at byte {offset}, container is {len} bytes")]
    Truncated { offset: usize, len: usize },

    #[error("invalid container: {0}")]
    Invalid(String),
}

/// Rewrites the status field embedded in a container blob.
///
/// The layout is owned by the implementation; callers treat the blob as
/// opaque and only rely on `finalize` returning a copy marked ready.
pub trait ContainerCodec: Send + Sync + 'static {
    fn finalize(&self, blob: Vec<u8>) -> Result<Vec<u8>, CodecError>;
}

/// Codec for containers that carry a one-byte status flag at a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusByteCodec {
    offset: usize,
    ready: u8,
}

impl StatusByteCodec {
    /// Status value meaning "assembled and verified".
    pub const READY: u8 = 1;

    pub fn new(offset: usize) -> Self {
        Self {
            offset,
            ready: Self::READY,
        }
    }

    /// Overrides the byte written to mark the container ready.
    pub fn with_ready_value(mut self, ready: u8) -> Self {
        self.ready = ready;
        self
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns `true` if `blob` already carries the ready marker.
    pub fn is_ready(&self, blob: &[u8]) -> bool {
        blob.get(self.offset) == Some(&self.ready)
    }
}

impl Default for StatusByteCodec {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ContainerCodec for StatusByteCodec {
    fn finalize(&self, mut blob: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let len = blob.len();
        let slot = blob.get_mut(self.offset).ok_or(CodecError::Truncated {
            offset: self.offset,
            len,
        })?;
        *slot = self.ready;
        Ok(blob)
    }
}
