use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata attached to every frame on the channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireMeta {
    pub timestamp: DateTime<Utc>,
    pub sender_id: Option<String>,
}

/// Envelope for a single named event travelling over the channel
///
/// Every text frame, in either direction, is one of these serialized as JSON:
/// `{"event": "...", "payload": {...}, "meta": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<WireMeta>,
}

impl WireMessage {
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            payload,
            meta: Some(WireMeta {
                timestamp: Utc::now(),
                sender_id: None,
            }),
        }
    }

    /// Stamp the frame with the user it originates from
    pub fn with_sender(mut self, sender_id: impl Into<String>) -> Self {
        let meta = self.meta.get_or_insert_with(|| WireMeta {
            timestamp: Utc::now(),
            sender_id: None,
        });
        meta.sender_id = Some(sender_id.into());
        self
    }

    /// Build a frame from any serializable payload
    pub fn from_payload<P: Serialize + ?Sized>(
        event: impl Into<String>,
        payload: &P,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(event, serde_json::to_value(payload)?))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Create an `error` frame carrying a human readable message
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(
            "error",
            serde_json::json!({ "message": message.into() }),
        )
    }
}
