use crate::model::peer::PeerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A candidate network path as produced or consumed by the peer transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
}

/// Entry of the append-only `rooms/{roomId}/candidates` collection.
/// Records are never mutated; the whole collection is dropped on room teardown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub from_peer_id: PeerId,
    #[serde(flatten)]
    pub candidate: IceCandidate,
    pub ts: DateTime<Utc>,
}

impl CandidateRecord {
    pub fn new(from_peer_id: PeerId, candidate: IceCandidate) -> Self {
        Self {
            from_peer_id,
            candidate,
            ts: Utc::now(),
        }
    }
}
