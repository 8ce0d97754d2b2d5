use crate::model::message::{ChatMessage, MessageKind};
use crate::model::peer::{PeerId, pair_key};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of a stored conversation between two peers; same derivation as the room key.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    pub fn for_peers(a: &PeerId, b: &PeerId) -> Self {
        Self(pair_key(a, b))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted form of a chat message. Ownership is not stored: it depends on
/// who loads the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub conversation_key: ConversationKey,
    pub sender_id: PeerId,
    pub sender_name: String,
    pub receiver_id: PeerId,
    pub body: String,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
}

impl StoredMessage {
    pub fn from_message(message: &ChatMessage, receiver_id: &PeerId) -> Self {
        Self {
            id: message.id.clone(),
            conversation_key: ConversationKey::for_peers(&message.sender_id, receiver_id),
            sender_id: message.sender_id.clone(),
            sender_name: message.sender_name.clone(),
            receiver_id: receiver_id.clone(),
            body: message.body.clone(),
            kind: message.kind,
            timestamp: message.timestamp,
        }
    }

    pub fn into_message(self, local_id: &PeerId) -> ChatMessage {
        ChatMessage::with_details(
            local_id,
            self.id,
            self.sender_id,
            self.sender_name,
            self.body,
            self.kind,
            self.timestamp,
        )
    }
}

/// Per-owner summary row shown in a conversation list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub owner_id: PeerId,
    pub other_id: PeerId,
    pub other_name: String,
    pub last_message: String,
    pub last_message_sender_id: PeerId,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationSummary {
    pub fn id(&self) -> String {
        format!("{}_{}", self.owner_id, ConversationKey::for_peers(&self.owner_id, &self.other_id))
    }
}
