use crate::error::StoreError;
use crate::room::{Role, RoomAssignment};
use crate::signaling::SignalingChannel;
use duplex_core::{PeerId, RoomDocument, RoomId, RoomPatch};
use std::sync::Arc;
use tracing::{info, warn};

/// Role taken from one snapshot, plus the write that reserves it.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleDecision {
    pub role: Role,
    pub write: Option<RoomPatch>,
}

/// Pure role decision. Idempotent: a peer that already holds `offerBy`
/// keeps its role on every call.
pub fn decide_role(
    self_id: &PeerId,
    peer_id: &PeerId,
    snapshot: Option<&RoomDocument>,
) -> RoleDecision {
    let Some(doc) = snapshot else {
        return RoleDecision {
            role: Role::Caller,
            write: Some(RoomPatch::create(self_id, peer_id)),
        };
    };

    if !doc.has_offer() {
        // Last write wins if the peer claims at the same time; the offer
        // exchange settles it on the next room change.
        let write = doc
            .offer_by
            .is_none()
            .then(|| RoomPatch::claim_caller(self_id));
        return RoleDecision {
            role: Role::Caller,
            write,
        };
    }

    let role = if doc.is_offered_by(self_id) {
        Role::Caller
    } else {
        Role::Answerer
    };
    RoleDecision { role, write: None }
}

pub struct RoleResolver {
    channel: Arc<dyn SignalingChannel>,
}

impl RoleResolver {
    pub fn new(channel: Arc<dyn SignalingChannel>) -> Self {
        Self { channel }
    }

    /// Reads the room authoritatively and takes a role, creating the room on
    /// first contact.
    pub async fn resolve(
        &self,
        self_id: &PeerId,
        peer_id: &PeerId,
    ) -> Result<RoomAssignment, StoreError> {
        let room_id = RoomId::for_peers(self_id, peer_id);
        let snapshot = self.channel.get(&room_id).await?;
        let decision = decide_role(self_id, peer_id, snapshot.as_ref());

        if let Some(patch) = decision.write {
            match (snapshot.is_none(), self.channel.set_merge(&room_id, patch).await) {
                (_, Ok(())) => {}
                (true, Err(e)) => return Err(e),
                (false, Err(e)) => warn!("Failed to claim caller role in {}: {}", room_id, e),
            }
        }

        info!("{} resolved role {} in room {}", self_id, decision.role, room_id);
        Ok(RoomAssignment {
            room_id,
            role: decision.role,
        })
    }

    /// Restart after the peer left: always take the caller role, creating a
    /// fresh generation of the room if it was collected.
    pub async fn claim_caller(
        &self,
        self_id: &PeerId,
        peer_id: &PeerId,
    ) -> Result<RoomAssignment, StoreError> {
        let room_id = RoomId::for_peers(self_id, peer_id);
        let patch = match self.channel.get(&room_id).await? {
            None => RoomPatch::create(self_id, peer_id),
            Some(_) => RoomPatch::claim_caller(self_id),
        };
        self.channel.set_merge(&room_id, patch).await?;

        info!("{} reclaimed role {} in room {}", self_id, Role::Caller, room_id);
        Ok(RoomAssignment {
            room_id,
            role: Role::Caller,
        })
    }
}
