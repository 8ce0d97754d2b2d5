use crate::error::StoreError;
use crate::signaling::{
    AtomicUpdate, AtomicWrite, SignalingChannel, Subscription, candidates_path, room_path,
};
use async_trait::async_trait;
use duplex_core::{CandidateRecord, PeerId, RoomDocument, RoomId, RoomPatch};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

struct CandidateListener {
    exclude: PeerId,
    tx: mpsc::UnboundedSender<CandidateRecord>,
}

#[derive(Default)]
struct StoreState {
    rooms: HashMap<RoomId, Map<String, Value>>,
    candidates: HashMap<RoomId, Vec<(String, Value)>>,
    room_listeners: HashMap<RoomId, Vec<mpsc::UnboundedSender<Option<RoomDocument>>>>,
    candidate_listeners: HashMap<RoomId, Vec<CandidateListener>>,
}

impl StoreState {
    fn snapshot(&self, room_id: &RoomId) -> Result<Option<RoomDocument>, StoreError> {
        let Some(fields) = self.rooms.get(room_id) else {
            return Ok(None);
        };
        RoomDocument::from_fields(fields.clone())
            .map(Some)
            .map_err(|e| StoreError::Decode {
                path: room_path(room_id),
                reason: e.to_string(),
            })
    }

    fn notify_room(&mut self, room_id: &RoomId) {
        let snapshot = match self.snapshot(room_id) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Skipping change notification: {}", e);
                return;
            }
        };

        if let Some(listeners) = self.room_listeners.get_mut(room_id) {
            listeners.retain(|tx| tx.send(snapshot.clone()).is_ok());
        }
    }

    fn notify_candidate(&mut self, room_id: &RoomId, record: &CandidateRecord) {
        if let Some(listeners) = self.candidate_listeners.get_mut(room_id) {
            listeners.retain(|listener| {
                if listener.exclude == record.from_peer_id {
                    return !listener.tx.is_closed();
                }
                listener.tx.send(record.clone()).is_ok()
            });
        }
    }
}

/// In-process document store with the same merge, transaction and
/// subscription contract as the remote one. Share it behind an `Arc` to let
/// several sessions rendezvous through it.
#[derive(Default)]
pub struct InMemorySignalingStore {
    state: Mutex<StoreState>,
    offline: AtomicBool,
}

impl InMemorySignalingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every operation fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn room_fields(&self, room_id: &RoomId) -> Option<Map<String, Value>> {
        self.state.lock().await.rooms.get(room_id).cloned()
    }

    pub async fn candidate_count(&self, room_id: &RoomId) -> usize {
        self.state
            .lock()
            .await
            .candidates
            .get(room_id)
            .map_or(0, Vec::len)
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_owned()));
        }
        Ok(())
    }

    fn merge_into(
        state: &mut StoreState,
        room_id: &RoomId,
        patch: &RoomPatch,
    ) -> Result<(), StoreError> {
        let fields = patch.to_fields().map_err(|e| StoreError::Decode {
            path: room_path(room_id),
            reason: e.to_string(),
        })?;

        let doc = state.rooms.entry(room_id.clone()).or_default();
        for (key, value) in fields {
            doc.insert(key, value);
        }
        Ok(())
    }

    fn aborted(room_id: &RoomId, cause: StoreError) -> StoreError {
        StoreError::Transaction {
            path: room_path(room_id),
            reason: cause.to_string(),
        }
    }
}

#[async_trait]
impl SignalingChannel for InMemorySignalingStore {
    async fn get(&self, room_id: &RoomId) -> Result<Option<RoomDocument>, StoreError> {
        self.ensure_online()?;
        self.state.lock().await.snapshot(room_id)
    }

    async fn set_merge(&self, room_id: &RoomId, patch: RoomPatch) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut state = self.state.lock().await;
        Self::merge_into(&mut state, room_id, &patch)?;
        state.notify_room(room_id);
        Ok(())
    }

    async fn run_atomic(
        &self,
        room_id: &RoomId,
        update: AtomicUpdate,
    ) -> Result<Option<RoomDocument>, StoreError> {
        self.ensure_online()?;
        let mut state = self.state.lock().await;
        let current = state
            .snapshot(room_id)
            .map_err(|e| Self::aborted(room_id, e))?;

        match update(current.as_ref()) {
            AtomicWrite::Keep => Ok(current),
            AtomicWrite::Merge(patch) => {
                Self::merge_into(&mut state, room_id, &patch)
                    .map_err(|e| Self::aborted(room_id, e))?;
                state.notify_room(room_id);
                state.snapshot(room_id)
            }
            AtomicWrite::Delete => {
                if state.rooms.remove(room_id).is_some() {
                    debug!("Deleted {}", room_path(room_id));
                    state.notify_room(room_id);
                }
                Ok(None)
            }
        }
    }

    async fn add_candidate(
        &self,
        room_id: &RoomId,
        record: CandidateRecord,
    ) -> Result<(), StoreError> {
        self.ensure_online()?;
        let value = serde_json::to_value(&record).map_err(|e| StoreError::Decode {
            path: candidates_path(room_id),
            reason: e.to_string(),
        })?;

        let mut state = self.state.lock().await;
        state
            .candidates
            .entry(room_id.clone())
            .or_default()
            .push((Uuid::new_v4().simple().to_string(), value));
        state.notify_candidate(room_id, &record);
        Ok(())
    }

    async fn subscribe(
        &self,
        room_id: &RoomId,
    ) -> Result<Subscription<Option<RoomDocument>>, StoreError> {
        self.ensure_online()?;
        let mut state = self.state.lock().await;
        let snapshot = state.snapshot(room_id)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(snapshot);
        state
            .room_listeners
            .entry(room_id.clone())
            .or_default()
            .push(tx);
        Ok(Subscription::new(rx))
    }

    async fn subscribe_candidates(
        &self,
        room_id: &RoomId,
        exclude: &PeerId,
    ) -> Result<Subscription<CandidateRecord>, StoreError> {
        self.ensure_online()?;
        let mut state = self.state.lock().await;
        let (tx, rx) = mpsc::unbounded_channel();

        for (id, value) in state.candidates.get(room_id).into_iter().flatten() {
            let record: CandidateRecord =
                serde_json::from_value(value.clone()).map_err(|e| StoreError::Decode {
                    path: format!("{}/{}", candidates_path(room_id), id),
                    reason: e.to_string(),
                })?;
            if &record.from_peer_id != exclude {
                let _ = tx.send(record);
            }
        }

        state
            .candidate_listeners
            .entry(room_id.clone())
            .or_default()
            .push(CandidateListener {
                exclude: exclude.clone(),
                tx,
            });
        Ok(Subscription::new(rx))
    }

    async fn delete_candidates(&self, room_id: &RoomId) {
        if let Err(e) = self.ensure_online() {
            warn!("Failed to delete candidates of room {}: {}", room_id, e);
            return;
        }

        let removed = self
            .state
            .lock()
            .await
            .candidates
            .remove(room_id)
            .map_or(0, |records| records.len());
        debug!("Deleted {} candidates of room {}", removed, room_id);
    }
}
