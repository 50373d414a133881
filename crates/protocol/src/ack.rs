use serde::{Deserialize, Serialize};

/// Progress/outcome part of an acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckMeta {
    /// Absent only when the inbound frame could not be parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<u64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub processed: bool,
}

/// Success flag and, on failure, a human-readable cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckData {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Acknowledgement sent back for every inbound chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub meta: AckMeta,
    pub data: AckData,
}

impl Ack {
    /// Chunk persisted, transfer not yet complete.
    pub fn partial(transfer_id: impl Into<String>, next_offset: u64) -> Self {
        Self {
            meta: AckMeta {
                transfer_id: Some(transfer_id.into()),
                next_offset: Some(next_offset),
                processed: false,
            },
            data: AckData {
                success: true,
                message: None,
            },
        }
    }

    /// Transfer fully received and finalized.
    pub fn processed(transfer_id: impl Into<String>) -> Self {
        Self {
            meta: AckMeta {
                transfer_id: Some(transfer_id.into()),
                next_offset: None,
                processed: true,
            },
            data: AckData {
                success: true,
                message: None,
            },
        }
    }

    /// Failure with the offset the client should resend from, if any.
    pub fn failure(
        transfer_id: Option<String>,
        next_offset: Option<u64>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            meta: AckMeta {
                transfer_id,
                next_offset,
                processed: false,
            },
            data: AckData {
                success: false,
                message: Some(message.into()),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.data.success
    }

    pub fn is_processed(&self) -> bool {
        self.meta.processed
    }

    pub fn next_offset(&self) -> Option<u64> {
        self.meta.next_offset
    }

    pub fn message(&self) -> Option<&str> {
        self.data.message.as_deref()
    }
}
