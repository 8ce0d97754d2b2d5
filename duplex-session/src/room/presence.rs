use crate::error::StoreError;
use crate::signaling::{AtomicWrite, SignalingChannel};
use duplex_core::{PeerId, RoomDocument, RoomId, RoomPatch};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Presence-derived status: both sessions open at the same time, or not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceUpdate {
    pub status: ConnectionStatus,
    /// The peer dropped out of a room both of us were in.
    pub renegotiate: bool,
}

/// Maintains this peer's entry in `joinedUsers` and interprets changes to it.
pub struct PresenceTracker {
    channel: Arc<dyn SignalingChannel>,
    self_id: PeerId,
    peer_id: PeerId,
    last_joined_count: usize,
}

impl PresenceTracker {
    pub fn new(channel: Arc<dyn SignalingChannel>, self_id: PeerId, peer_id: PeerId) -> Self {
        Self {
            channel,
            self_id,
            peer_id,
            last_joined_count: 0,
        }
    }

    /// Adds this peer to `joinedUsers`. No-op if already present or if the
    /// room is gone.
    pub async fn join(&self, room_id: &RoomId) -> Result<Option<RoomDocument>, StoreError> {
        let self_id = self.self_id.clone();
        let doc = self
            .channel
            .run_atomic(
                room_id,
                Box::new(move |doc| {
                    let Some(doc) = doc else {
                        return AtomicWrite::Keep;
                    };
                    if doc.is_joined(&self_id) || !doc.is_participant(&self_id) {
                        return AtomicWrite::Keep;
                    }
                    let mut joined = doc.joined_users.clone();
                    joined.insert(self_id);
                    AtomicWrite::Merge(RoomPatch::joined(joined))
                }),
            )
            .await?;

        debug!("{} joined room {}", self.self_id, room_id);
        Ok(doc)
    }

    /// Removes this peer from `joinedUsers`. The last one out deletes the room
    /// and its candidates.
    pub async fn leave(&self, room_id: &RoomId) -> Result<(), StoreError> {
        let self_id = self.self_id.clone();
        let remaining = self
            .channel
            .run_atomic(
                room_id,
                Box::new(move |doc| {
                    let Some(doc) = doc else {
                        return AtomicWrite::Keep;
                    };
                    let joined: BTreeSet<PeerId> = doc
                        .joined_users
                        .iter()
                        .filter(|id| **id != self_id)
                        .cloned()
                        .collect();
                    if joined.is_empty() {
                        AtomicWrite::Delete
                    } else if joined.len() == doc.joined_users.len() {
                        AtomicWrite::Keep
                    } else {
                        AtomicWrite::Merge(RoomPatch::joined(joined))
                    }
                }),
            )
            .await?;

        if remaining.is_none() {
            info!("Room {} is empty, collecting it", room_id);
            self.channel.delete_candidates(room_id).await;
        } else {
            debug!("{} left room {}", self.self_id, room_id);
        }
        Ok(())
    }

    /// Interprets a new `joinedUsers` value. Renegotiation is requested only
    /// when both peers were present and the peer, not this side, went away.
    pub fn observe(&mut self, joined: &BTreeSet<PeerId>) -> PresenceUpdate {
        let has_self = joined.contains(&self.self_id);
        let has_peer = joined.contains(&self.peer_id);

        let renegotiate = self.last_joined_count == 2 && has_self && !has_peer;
        self.last_joined_count = joined.len();

        let status = if has_self && has_peer {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Connecting
        };
        PresenceUpdate {
            status,
            renegotiate,
        }
    }

    /// Forgets the previous membership, for a fresh room generation.
    pub fn reset(&mut self) {
        self.last_joined_count = 0;
    }
}
