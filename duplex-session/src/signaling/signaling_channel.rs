use crate::error::StoreError;
use crate::signaling::Subscription;
use async_trait::async_trait;
use duplex_core::{CandidateRecord, PeerId, RoomDocument, RoomId, RoomPatch};

/// Outcome of a read-modify-write on a room document.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomicWrite {
    /// Leave the document as it is.
    Keep,
    Merge(RoomPatch),
    Delete,
}

/// Computes the write from the snapshot read inside the transaction.
pub type AtomicUpdate = Box<dyn FnOnce(Option<&RoomDocument>) -> AtomicWrite + Send>;

/// Shared transactional document store used to bootstrap a peer connection.
///
/// Layout: `rooms/{roomId}` holds the [`RoomDocument`], and
/// `rooms/{roomId}/candidates/{autoId}` holds [`CandidateRecord`]s.
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    /// Authoritative read, never served from a local replica.
    async fn get(&self, room_id: &RoomId) -> Result<Option<RoomDocument>, StoreError>;

    /// Non-destructive partial write; creates the document if it is missing.
    async fn set_merge(&self, room_id: &RoomId, patch: RoomPatch) -> Result<(), StoreError>;

    /// Transactional read-modify-write. Returns the document as left by the write.
    async fn run_atomic(
        &self,
        room_id: &RoomId,
        update: AtomicUpdate,
    ) -> Result<Option<RoomDocument>, StoreError>;

    async fn add_candidate(&self, room_id: &RoomId, record: CandidateRecord)
    -> Result<(), StoreError>;

    /// Current snapshot first, then every subsequent change (`None` once deleted).
    async fn subscribe(
        &self,
        room_id: &RoomId,
    ) -> Result<Subscription<Option<RoomDocument>>, StoreError>;

    /// Existing candidates first, then every new one; records authored by
    /// `exclude` are never delivered.
    async fn subscribe_candidates(
        &self,
        room_id: &RoomId,
        exclude: &PeerId,
    ) -> Result<Subscription<CandidateRecord>, StoreError>;

    /// Best-effort bulk delete. Failures are logged, not returned.
    async fn delete_candidates(&self, room_id: &RoomId);
}

pub fn room_path(room_id: &RoomId) -> String {
    format!("rooms/{}", room_id)
}

pub fn candidates_path(room_id: &RoomId) -> String {
    format!("rooms/{}/candidates", room_id)
}
