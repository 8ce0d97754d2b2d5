use crate::model::peer::{PeerId, pair_key};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// Rendezvous key shared by two peers. Both sides derive the same value
/// independently, whichever of them computes it.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn for_peers(a: &PeerId, b: &PeerId) -> Self {
        Self(pair_key(a, b))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    #[default]
    Init,
    WaitingAnswer,
    Answered,
}

/// The `rooms/{roomId}` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomDocument {
    pub participants: BTreeSet<PeerId>,
    pub offer_sdp: Option<String>,
    pub offer_by: Option<PeerId>,
    pub answer_sdp: Option<String>,
    pub answer_by: Option<PeerId>,
    pub status: RoomStatus,
    pub joined_users: BTreeSet<PeerId>,
    pub created_at: Option<DateTime<Utc>>,
}

impl RoomDocument {
    pub fn from_fields(fields: Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(fields))
    }

    pub fn has_offer(&self) -> bool {
        self.offer_sdp.is_some()
    }

    pub fn has_answer(&self) -> bool {
        self.answer_sdp.is_some()
    }

    pub fn is_offered_by(&self, peer_id: &PeerId) -> bool {
        self.offer_by.as_ref() == Some(peer_id)
    }

    pub fn is_joined(&self, peer_id: &PeerId) -> bool {
        self.joined_users.contains(peer_id)
    }

    /// A room created before the participant list was written accepts anyone.
    pub fn is_participant(&self, peer_id: &PeerId) -> bool {
        self.participants.is_empty() || self.participants.contains(peer_id)
    }
}

/// Partial update for a room document. Only the populated fields are
/// written; `Some(None)` on a clearable field writes an explicit null.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participants: Option<BTreeSet<PeerId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_sdp: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_by: Option<Option<PeerId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_sdp: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_by: Option<Option<PeerId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RoomStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_users: Option<BTreeSet<PeerId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl RoomPatch {
    /// First contact: the creator reserves the caller role in the same write.
    /// `joinedUsers` is left out so a concurrent join is never overwritten.
    pub fn create(self_id: &PeerId, peer_id: &PeerId) -> Self {
        Self {
            participants: Some(BTreeSet::from([self_id.clone(), peer_id.clone()])),
            offer_by: Some(Some(self_id.clone())),
            status: Some(RoomStatus::Init),
            created_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn claim_caller(self_id: &PeerId) -> Self {
        Self {
            offer_by: Some(Some(self_id.clone())),
            ..Default::default()
        }
    }

    /// Publishes an offer and starts a new generation: any previous answer is cleared.
    pub fn offer(sdp: String, by: &PeerId) -> Self {
        Self {
            offer_sdp: Some(Some(sdp)),
            offer_by: Some(Some(by.clone())),
            answer_sdp: Some(None),
            answer_by: Some(None),
            status: Some(RoomStatus::WaitingAnswer),
            ..Default::default()
        }
    }

    pub fn answer(sdp: String, by: &PeerId) -> Self {
        Self {
            answer_sdp: Some(Some(sdp)),
            answer_by: Some(Some(by.clone())),
            status: Some(RoomStatus::Answered),
            ..Default::default()
        }
    }

    pub fn joined(users: BTreeSet<PeerId>) -> Self {
        Self {
            joined_users: Some(users),
            ..Default::default()
        }
    }

    pub fn to_fields(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            _ => Ok(Map::new()),
        }
    }
}
