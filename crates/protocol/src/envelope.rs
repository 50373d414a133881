use serde::{Deserialize, Serialize};

use crate::ack::Ack;
use crate::constants::EventType;

/// Envelope for all text-frame communication.
///
/// The `payload` field uses `serde_json::value::RawValue` to defer
/// deserialization until the event type is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: EventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Box<serde_json::value::RawValue>>,
}

/// Payload of a `status` event: asks where a transfer should resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub transfer_id: String,
}

impl Envelope {
    /// Creates a new envelope with the given event and payload.
    pub fn new<T: Serialize>(event: EventType, payload: Option<&T>) -> Result<Self, serde_json::Error> {
        let raw = match payload {
            Some(p) => {
                let json = serde_json::to_string(p)?;
                Some(serde_json::value::RawValue::from_string(json)?)
            }
            None => None,
        };
        Ok(Self {
            event,
            payload: raw,
        })
    }

    /// Wraps an acknowledgement in an `upload` envelope.
    pub fn upload(ack: &Ack) -> Result<Self, serde_json::Error> {
        Self::new(EventType::Upload, Some(ack))
    }

    /// Creates an `error` envelope carrying a plain message.
    pub fn error(message: &str) -> Result<Self, serde_json::Error> {
        Self::new(
            EventType::Error,
            Some(&serde_json::json!({ "message": message })),
        )
    }

    /// Deserializes the payload into the given type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<Option<T>, serde_json::Error> {
        match &self.payload {
            Some(raw) => Ok(Some(serde_json::from_str(raw.get())?)),
            None => Ok(None),
        }
    }
}
