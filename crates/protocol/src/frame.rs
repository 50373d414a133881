//! Binary chunk frames: 4-byte big-endian header length + JSON header + raw payload.

use serde::{Deserialize, Serialize};

/// Header for a binary chunk frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkHeader {
    #[serde(default)]
    pub version: String,
    pub transfer_id: String,
    pub start_offset: u64,
    pub total_length: u64,
    /// SHA-256 hex of the payload (empty means no verification).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub checksum: String,
}

/// One inbound chunk-submission event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkEvent {
    pub version: String,
    pub transfer_id: String,
    pub start_offset: u64,
    pub total_length: u64,
    pub checksum: String,
    pub bytes: Vec<u8>,
}

impl ChunkEvent {
    /// Builds an event without a checksum.
    pub fn new(
        transfer_id: impl Into<String>,
        start_offset: u64,
        total_length: u64,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            version: crate::constants::PROTOCOL_VERSION.to_string(),
            transfer_id: transfer_id.into(),
            start_offset,
            total_length,
            checksum: String::new(),
            bytes,
        }
    }

    /// Splits the event back into its header and payload.
    pub fn into_parts(self) -> (ChunkHeader, Vec<u8>) {
        let header = ChunkHeader {
            version: self.version,
            transfer_id: self.transfer_id,
            start_offset: self.start_offset,
            total_length: self.total_length,
            checksum: self.checksum,
        };
        (header, self.bytes)
    }

    fn from_parts(header: ChunkHeader, bytes: Vec<u8>) -> Self {
        Self {
            version: header.version,
            transfer_id: header.transfer_id,
            start_offset: header.start_offset,
            total_length: header.total_length,
            checksum: header.checksum,
            bytes,
        }
    }
}

/// Parses a raw binary WebSocket frame into a [`ChunkEvent`].
///
/// Wire format: `[4 bytes: header_len (big-endian)][header_len bytes: JSON][rest: payload]`
pub fn parse_chunk_frame(data: &[u8]) -> Result<ChunkEvent, FrameError> {
    if data.len() < 4 {
        return Err(FrameError::TooShort);
    }

    let header_len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;

    if data.len() - 4 < header_len {
        return Err(FrameError::HeaderTruncated {
            expected: header_len,
            got: data.len() - 4,
        });
    }

    let header_bytes = &data[4..4 + header_len];
    let payload = data[4 + header_len..].to_vec();

    let header: ChunkHeader = serde_json::from_slice(header_bytes)
        .map_err(|e| FrameError::InvalidJson(e.to_string()))?;

    Ok(ChunkEvent::from_parts(header, payload))
}

/// Encodes a chunk frame for sending over WebSocket.
pub fn encode_chunk_frame(header: &ChunkHeader, payload: &[u8]) -> Result<Vec<u8>, serde_json::Error> {
    let header_json = serde_json::to_vec(header)?;
    let header_len = header_json.len() as u32;

    let mut buf = Vec::with_capacity(4 + header_json.len() + payload.len());
    buf.extend_from_slice(&header_len.to_be_bytes());
    buf.extend_from_slice(&header_json);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Errors from chunk frame parsing.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("message too short (need at least 4 bytes)")]
    TooShort,

    #[error("header truncated: expected {expected} bytes, got {got}")]
    HeaderTruncated { expected: usize, got: usize },

    #[error("invalid header JSON: {0}")]
    InvalidJson(String),
}
