use crate::error::{SessionError, TransportError};
use crate::negotiation::NegotiationState;
use crate::room::Role;
use crate::session::{Inbound, SessionEvent};
use crate::signaling::SignalingChannel;
use crate::transport::{
    PeerConnectionState, PeerTransport, SdpKind, TransportConfig, TransportEvent,
    TransportFactory,
};
use bytes::Bytes;
use duplex_core::{CandidateRecord, IceCandidate, PeerId, RoomDocument, RoomId, RoomPatch};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

const TRANSPORT_EVENT_CAPACITY: usize = 64;

/// Drives one room generation through offer, answer and candidate exchange.
///
/// Runs on the session actor: every method is called from its loop, and the
/// transport callbacks and candidate feed it starts come back through the
/// actor inbox tagged with the transport `epoch` they belong to.
pub(crate) struct NegotiationOrchestrator {
    self_id: PeerId,
    channel: Arc<dyn SignalingChannel>,
    factory: Arc<dyn TransportFactory>,
    config: TransportConfig,
    inbox: mpsc::UnboundedSender<Inbound>,
    events: broadcast::Sender<SessionEvent>,
    state: watch::Sender<NegotiationState>,
    role: watch::Sender<Option<Role>>,

    room_id: Option<RoomId>,
    epoch: u64,
    transport: Option<Arc<dyn PeerTransport>>,
    transport_feed: Option<JoinHandle<()>>,
    candidate_feed: Option<JoinHandle<()>>,
    remote_description_set: bool,
    pending_candidates: Vec<IceCandidate>,

    local_offer: Option<String>,
    applied_answer: Option<String>,
    answered_offer: Option<String>,
}

impl NegotiationOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        self_id: PeerId,
        channel: Arc<dyn SignalingChannel>,
        factory: Arc<dyn TransportFactory>,
        config: TransportConfig,
        inbox: mpsc::UnboundedSender<Inbound>,
        events: broadcast::Sender<SessionEvent>,
        state: watch::Sender<NegotiationState>,
        role: watch::Sender<Option<Role>>,
    ) -> Self {
        Self {
            self_id,
            channel,
            factory,
            config,
            inbox,
            events,
            state,
            role,
            room_id: None,
            epoch: 0,
            transport: None,
            transport_feed: None,
            candidate_feed: None,
            remote_description_set: false,
            pending_candidates: Vec::new(),
            local_offer: None,
            applied_answer: None,
            answered_offer: None,
        }
    }

    pub(crate) fn state(&self) -> NegotiationState {
        *self.state.borrow()
    }

    fn current_role(&self) -> Option<Role> {
        *self.role.borrow()
    }

    pub(crate) fn set_state(&self, next: NegotiationState) {
        let changed = self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
        if changed {
            debug!("{} negotiation state -> {}", self.self_id, next);
            let _ = self.events.send(SessionEvent::StateChanged(next));
        }
    }

    fn set_role(&self, role: Role) {
        self.role.send_replace(Some(role));
        let _ = self.events.send(SessionEvent::RoleResolved(role));
    }

    /// Starts negotiating in `room_id` with the resolved role.
    pub(crate) async fn begin(&mut self, room_id: RoomId, role: Role) -> Result<(), SessionError> {
        self.room_id = Some(room_id.clone());
        self.set_role(role);

        match role {
            Role::Caller => self.start_caller(&room_id).await,
            Role::Answerer => {
                self.set_state(NegotiationState::AnswererAwaitingOffer);
                // The room feed is already live, so an offer published after
                // this read still reaches `on_room_changed`.
                match self.channel.get(&room_id).await? {
                    Some(doc) => self.answer_if_new(&room_id, &doc).await,
                    None => Ok(()),
                }
            }
        }
    }

    async fn start_caller(&mut self, room_id: &RoomId) -> Result<(), SessionError> {
        self.set_state(NegotiationState::CallerOffering);

        // A completed exchange from an earlier generation: its candidates
        // must not reach the new transports.
        if let Some(doc) = self.channel.get(room_id).await?
            && doc.has_offer()
            && doc.has_answer()
        {
            self.channel.delete_candidates(room_id).await;
        }

        let transport = self.replace_transport(room_id, true).await?;
        let offer = transport.create_local_offer().await?;
        self.local_offer = Some(offer.clone());
        self.channel
            .set_merge(room_id, RoomPatch::offer(offer, &self.self_id))
            .await?;

        info!("{} published offer in room {}", self.self_id, room_id);
        Ok(())
    }

    /// Reacts to a change of the room document.
    pub(crate) async fn on_room_changed(
        &mut self,
        doc: Option<&RoomDocument>,
    ) -> Result<(), SessionError> {
        let (Some(doc), Some(room_id)) = (doc, self.room_id.clone()) else {
            return Ok(());
        };
        if matches!(
            self.state(),
            NegotiationState::Idle | NegotiationState::Closed
        ) {
            return Ok(());
        }

        match self.current_role() {
            Some(Role::Caller) => {
                if self.is_foreign_offer(doc) {
                    return self.resolve_offer_race(&room_id).await;
                }
                self.apply_answer_if_new(doc).await
            }
            Some(Role::Answerer) => self.answer_if_new(&room_id, doc).await,
            None => Ok(()),
        }
    }

    fn is_foreign_offer(&self, doc: &RoomDocument) -> bool {
        doc.offer_sdp.is_some()
            && doc.offer_sdp != self.local_offer
            && doc.offer_by.as_ref().is_some_and(|by| *by != self.self_id)
    }

    /// Both sides offered. The authoritative document decides: if its offer
    /// is the peer's, this side discards its own and answers instead.
    async fn resolve_offer_race(&mut self, room_id: &RoomId) -> Result<(), SessionError> {
        let Some(latest) = self.channel.get(room_id).await? else {
            return Ok(());
        };
        if !self.is_foreign_offer(&latest) {
            return self.apply_answer_if_new(&latest).await;
        }

        info!(
            "{} lost the offer race in room {}, continuing as {}",
            self.self_id,
            room_id,
            Role::Answerer
        );
        self.close_transport().await;
        self.local_offer = None;
        self.applied_answer = None;
        self.set_role(Role::Answerer);
        self.set_state(NegotiationState::AnswererAwaitingOffer);
        self.answer_if_new(room_id, &latest).await
    }

    async fn apply_answer_if_new(&mut self, doc: &RoomDocument) -> Result<(), SessionError> {
        if self.local_offer.is_none() || doc.offer_sdp != self.local_offer {
            return Ok(());
        }
        let Some(answer) = doc.answer_sdp.clone() else {
            return Ok(());
        };
        if doc.answer_by.as_ref() == Some(&self.self_id)
            || self.applied_answer.as_ref() == Some(&answer)
        {
            return Ok(());
        }
        let Some(transport) = self.transport.clone() else {
            return Ok(());
        };

        self.applied_answer = Some(answer.clone());
        transport
            .set_remote_description(SdpKind::Answer, answer)
            .await?;
        self.remote_description_set = true;
        debug!("{} applied remote answer", self.self_id);

        self.set_state(NegotiationState::ExchangingCandidates);
        self.flush_pending_candidates().await
    }

    /// Answers the peer's offer unless it was already answered by this
    /// transport generation.
    async fn answer_if_new(
        &mut self,
        room_id: &RoomId,
        doc: &RoomDocument,
    ) -> Result<(), SessionError> {
        let Some(offer) = doc.offer_sdp.clone() else {
            return Ok(());
        };
        let offered_by_peer = doc.offer_by.as_ref().is_some_and(|by| *by != self.self_id);
        let answer_slot_free =
            doc.answer_by.is_none() || doc.answer_by.as_ref() == Some(&self.self_id);
        if !offered_by_peer
            || !answer_slot_free
            || self.answered_offer.as_ref() == Some(&offer)
        {
            return Ok(());
        }

        // Each offer gets a fresh transport; a re-offer comes from a new
        // transport on the other side.
        self.answered_offer = Some(offer.clone());
        let transport = self.replace_transport(room_id, false).await?;
        transport.set_remote_description(SdpKind::Offer, offer).await?;
        self.remote_description_set = true;

        let answer = transport.create_local_answer().await?;
        self.channel
            .set_merge(room_id, RoomPatch::answer(answer, &self.self_id))
            .await?;
        info!("{} published answer in room {}", self.self_id, room_id);

        self.set_state(NegotiationState::ExchangingCandidates);
        self.flush_pending_candidates().await
    }

    pub(crate) async fn on_remote_candidate(
        &mut self,
        epoch: u64,
        record: CandidateRecord,
    ) -> Result<(), SessionError> {
        if epoch != self.epoch {
            return Ok(());
        }
        if !self.remote_description_set {
            self.pending_candidates.push(record.candidate);
            return Ok(());
        }
        let Some(transport) = self.transport.clone() else {
            return Ok(());
        };
        transport.add_remote_candidate(record.candidate).await?;
        Ok(())
    }

    async fn flush_pending_candidates(&mut self) -> Result<(), SessionError> {
        let Some(transport) = self.transport.clone() else {
            return Ok(());
        };
        let pending = std::mem::take(&mut self.pending_candidates);
        if !pending.is_empty() {
            debug!("{} flushing {} buffered candidates", self.self_id, pending.len());
        }

        let mut first_error: Option<TransportError> = None;
        for candidate in pending {
            if let Err(e) = transport.add_remote_candidate(candidate).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Handles a transport callback. Returns the payload of an incoming message.
    pub(crate) async fn on_transport_event(
        &mut self,
        epoch: u64,
        event: TransportEvent,
    ) -> Result<Option<Bytes>, SessionError> {
        if epoch != self.epoch || self.state().is_closed() {
            return Ok(None);
        }

        match event {
            TransportEvent::LocalCandidate(candidate) => {
                if let Some(room_id) = &self.room_id {
                    let record = CandidateRecord::new(self.self_id.clone(), candidate);
                    self.channel.add_candidate(room_id, record).await?;
                }
            }
            TransportEvent::ConnectionStateChanged(state) => {
                info!("{} transport state {:?}", self.self_id, state);
                let _ = self.events.send(SessionEvent::TransportState(state));
                if state == PeerConnectionState::Connected {
                    self.set_state(NegotiationState::Connected);
                }
            }
            TransportEvent::DataChannelOpen => {
                info!("{} data channel open", self.self_id);
                self.set_state(NegotiationState::Connected);
            }
            TransportEvent::DataChannelClosed => {
                debug!("{} data channel closed", self.self_id);
            }
            TransportEvent::Message(data) => return Ok(Some(data)),
        }
        Ok(None)
    }

    /// `false` when there is no open data channel.
    pub(crate) async fn send(&self, data: Bytes) -> bool {
        match &self.transport {
            Some(transport) => transport.send_data(data).await,
            None => false,
        }
    }

    async fn replace_transport(
        &mut self,
        room_id: &RoomId,
        open_data_channel: bool,
    ) -> Result<Arc<dyn PeerTransport>, SessionError> {
        self.close_transport().await;
        self.epoch += 1;
        let epoch = self.epoch;

        let (tx, mut rx) = mpsc::channel(TRANSPORT_EVENT_CAPACITY);
        let transport = self
            .factory
            .create(&self.config, open_data_channel, tx)
            .await?;

        let inbox = self.inbox.clone();
        self.transport_feed = Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if inbox.send(Inbound::Transport { epoch, event }).is_err() {
                    break;
                }
            }
        }));

        // Restarted per transport so candidates already in the room are
        // replayed to it.
        let mut candidates = self
            .channel
            .subscribe_candidates(room_id, &self.self_id)
            .await?;
        let inbox = self.inbox.clone();
        self.candidate_feed = Some(tokio::spawn(async move {
            while let Some(record) = candidates.recv().await {
                if inbox.send(Inbound::RemoteCandidate { epoch, record }).is_err() {
                    break;
                }
            }
        }));

        self.transport = Some(transport.clone());
        Ok(transport)
    }

    async fn close_transport(&mut self) {
        if let Some(feed) = self.candidate_feed.take() {
            feed.abort();
        }
        if let Some(feed) = self.transport_feed.take() {
            feed.abort();
        }
        if let Some(transport) = self.transport.take() {
            transport.close().await;
        }
        self.remote_description_set = false;
        self.pending_candidates.clear();
    }

    /// Drops all per-generation state ahead of a restart.
    pub(crate) async fn reset_for_renegotiation(&mut self) {
        self.close_transport().await;
        self.epoch += 1;
        self.room_id = None;
        self.local_offer = None;
        self.applied_answer = None;
        self.answered_offer = None;
        self.set_state(NegotiationState::Renegotiating);
    }

    pub(crate) async fn shutdown(&mut self) {
        self.close_transport().await;
        self.epoch += 1;
        self.room_id = None;
        self.set_state(NegotiationState::Closed);
        debug!("{} negotiation shut down", self.self_id);
    }
}
