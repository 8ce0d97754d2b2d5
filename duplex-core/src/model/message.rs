use crate::model::peer::PeerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
    System,
}

/// An entry of the in-memory chat log. Sent and received messages share this
/// shape; whether it is ours is decided once, when it is constructed.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: PeerId,
    pub sender_name: String,
    pub body: String,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    is_from_me: bool,
}

impl ChatMessage {
    pub fn new(
        local_id: &PeerId,
        sender_id: PeerId,
        sender_name: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::with_details(
            local_id,
            Uuid::new_v4().to_string(),
            sender_id,
            sender_name.into(),
            body.into(),
            MessageKind::Text,
            Utc::now(),
        )
    }

    pub fn with_details(
        local_id: &PeerId,
        id: String,
        sender_id: PeerId,
        sender_name: String,
        body: String,
        kind: MessageKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let is_from_me = &sender_id == local_id;
        Self {
            id,
            sender_id,
            sender_name,
            body,
            kind,
            timestamp,
            is_from_me,
        }
    }

    /// Rebuilds a message that arrived over the data channel from `sender_id`.
    pub fn from_wire(local_id: &PeerId, sender_id: PeerId, wire: WireMessage) -> Self {
        Self::with_details(
            local_id,
            wire.id,
            sender_id,
            wire.sender_name,
            wire.body,
            wire.kind,
            wire.sent_at,
        )
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_from_me(&self) -> bool {
        self.is_from_me
    }

    pub fn to_wire(&self) -> WireMessage {
        WireMessage {
            id: self.id.clone(),
            sender_name: self.sender_name.clone(),
            body: self.body.clone(),
            kind: self.kind,
            sent_at: self.timestamp,
        }
    }
}

/// Data-channel payload. The sender is implied by the channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    pub id: String,
    pub sender_name: String,
    pub body: String,
    #[serde(default)]
    pub kind: MessageKind,
    pub sent_at: DateTime<Utc>,
}

impl WireMessage {
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Payloads that are not a JSON envelope are taken as a plain text body.
    pub fn decode(data: &[u8], fallback_sender_name: &str) -> Self {
        serde_json::from_slice(data).unwrap_or_else(|_| Self {
            id: Uuid::new_v4().to_string(),
            sender_name: fallback_sender_name.to_owned(),
            body: String::from_utf8_lossy(data).into_owned(),
            kind: MessageKind::Text,
            sent_at: Utc::now(),
        })
    }
}
