use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::messaging::{MessageBus, MessagePersistence};
use crate::negotiation::{NegotiationOrchestrator, NegotiationState};
use crate::room::{ConnectionStatus, PresenceTracker, Role, RoleResolver};
use crate::session::{Inbound, SessionCommand, SessionEvent};
use crate::signaling::SignalingChannel;
use crate::transport::TransportFactory;
use bytes::Bytes;
use duplex_core::{ChatMessage, MessageKind, PeerProfile, RoomDocument, RoomId, WireMessage};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const COMMAND_CAPACITY: usize = 32;

/// External collaborators a session talks to.
#[derive(Clone)]
pub struct SessionBackends {
    pub signaling: Arc<dyn SignalingChannel>,
    pub transports: Arc<dyn TransportFactory>,
    pub persistence: Arc<dyn MessagePersistence>,
}

/// One open chat with a peer.
///
/// All signaling, presence and transport work runs on a single actor task;
/// this handle talks to it through commands and observes it through watch
/// channels and the [`SessionEvent`] stream.
pub struct ChatSession {
    local: PeerProfile,
    remote: PeerProfile,
    room_id: RoomId,
    commands: mpsc::Sender<SessionCommand>,
    events: broadcast::Sender<SessionEvent>,
    status: watch::Receiver<ConnectionStatus>,
    state: watch::Receiver<NegotiationState>,
    role: watch::Receiver<Option<Role>>,
    messages: watch::Receiver<Vec<ChatMessage>>,
    task: JoinHandle<()>,
}

impl ChatSession {
    /// Opens the chat and starts connecting. The returned receiver is
    /// subscribed before the actor starts, so it sees every event.
    pub fn open(
        config: SessionConfig,
        local: PeerProfile,
        remote: PeerProfile,
        backends: SessionBackends,
    ) -> (Self, broadcast::Receiver<SessionEvent>) {
        let (events, events_rx) = broadcast::channel(config.event_capacity.max(1));
        let (status_tx, status) = watch::channel(ConnectionStatus::default());
        let (state_tx, state) = watch::channel(NegotiationState::default());
        let (role_tx, role) = watch::channel(None);
        let (commands, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

        let room_id = RoomId::for_peers(&local.id, &remote.id);
        let bus = MessageBus::new(
            local.clone(),
            remote.clone(),
            backends.persistence.clone(),
            events.clone(),
        );
        let messages = bus.subscribe();

        let orchestrator = NegotiationOrchestrator::new(
            local.id.clone(),
            backends.signaling.clone(),
            backends.transports.clone(),
            config.transport.clone(),
            inbox_tx.clone(),
            events.clone(),
            state_tx,
            role_tx,
        );

        let actor = SessionActor {
            presence: PresenceTracker::new(
                backends.signaling.clone(),
                local.id.clone(),
                remote.id.clone(),
            ),
            resolver: RoleResolver::new(backends.signaling.clone()),
            channel: backends.signaling,
            local: local.clone(),
            remote: remote.clone(),
            load_history: config.load_history,
            orchestrator,
            bus,
            events: events.clone(),
            status: status_tx,
            commands: commands_rx,
            inbox_tx,
            inbox: inbox_rx,
            room_id: None,
            generation: 0,
            room_feed: None,
        };
        let task = tokio::spawn(actor.run());

        let session = Self {
            local,
            remote,
            room_id,
            commands,
            events,
            status,
            state,
            role,
            messages,
            task,
        };
        (session, events_rx)
    }

    pub fn local(&self) -> &PeerProfile {
        &self.local
    }

    pub fn remote(&self) -> &PeerProfile {
        &self.remote
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn state(&self) -> watch::Receiver<NegotiationState> {
        self.state.clone()
    }

    pub fn role(&self) -> watch::Receiver<Option<Role>> {
        self.role.clone()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.borrow().clone()
    }

    pub fn watch_messages(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.messages.clone()
    }

    /// Sends a text message. `Ok(None)` when there is no open data channel
    /// yet; the message is then not logged.
    pub async fn send_message(
        &self,
        body: impl Into<String>,
    ) -> Result<Option<ChatMessage>, SessionError> {
        self.send(MessageKind::Text, body).await
    }

    pub async fn send(
        &self,
        kind: MessageKind,
        body: impl Into<String>,
    ) -> Result<Option<ChatMessage>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Send {
                kind,
                body: body.into(),
                reply,
            })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Drops the current connection and renegotiates as caller.
    pub async fn reconnect(&self) -> Result<(), SessionError> {
        self.commands
            .send(SessionCommand::Reconnect)
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Leaves the room, closes the transport and waits for the session to stop.
    pub async fn close(self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(SessionCommand::Close { reply }).await.is_ok() {
            let _ = rx.await;
        }
        if let Err(e) = self.task.await {
            error!("Session task for {} failed: {}", self.room_id, e);
        }
    }
}

struct SessionActor {
    local: PeerProfile,
    remote: PeerProfile,
    load_history: bool,
    channel: Arc<dyn SignalingChannel>,
    resolver: RoleResolver,
    presence: PresenceTracker,
    orchestrator: NegotiationOrchestrator,
    bus: MessageBus,
    events: broadcast::Sender<SessionEvent>,
    status: watch::Sender<ConnectionStatus>,
    commands: mpsc::Receiver<SessionCommand>,
    inbox_tx: mpsc::UnboundedSender<Inbound>,
    inbox: mpsc::UnboundedReceiver<Inbound>,
    room_id: Option<RoomId>,
    generation: u64,
    room_feed: Option<JoinHandle<()>>,
}

impl SessionActor {
    async fn run(mut self) {
        info!("Session {} -> {} started", self.local.id, self.remote.id);

        if self.load_history
            && let Err(e) = self.bus.load_history().await
        {
            warn!("Failed to load history of {}: {}", self.bus.key(), e);
        }
        self.open_room(false).await;

        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(SessionCommand::Send { kind, body, reply }) => {
                            let _ = reply.send(self.send(kind, body).await);
                        }
                        Some(SessionCommand::Reconnect) => self.renegotiate().await,
                        Some(SessionCommand::Close { reply }) => {
                            self.teardown().await;
                            let _ = reply.send(());
                            break;
                        }
                        None => {
                            info!("Session handle dropped, closing");
                            self.teardown().await;
                            break;
                        }
                    }
                }

                Some(inbound) = self.inbox.recv() => self.handle_inbound(inbound).await,
            }
        }

        info!("Session {} -> {} finished", self.local.id, self.remote.id);
    }

    fn report(&self, result: Result<(), SessionError>) {
        if let Err(e) = result {
            warn!("Session {} -> {}: {}", self.local.id, self.remote.id, e);
            let _ = self.events.send(SessionEvent::Error(e));
        }
    }

    /// Resolves a role, joins the room and starts negotiating. Restarts after
    /// a peer departure always take the caller role.
    async fn open_room(&mut self, restart: bool) {
        let result = self.try_open_room(restart).await;
        self.report(result);
    }

    async fn try_open_room(&mut self, restart: bool) -> Result<(), SessionError> {
        self.orchestrator.set_state(NegotiationState::RoleResolving);
        let assignment = if restart {
            self.resolver
                .claim_caller(&self.local.id, &self.remote.id)
                .await?
        } else {
            self.resolver.resolve(&self.local.id, &self.remote.id).await?
        };
        let room_id = assignment.room_id;
        self.room_id = Some(room_id.clone());

        self.presence.reset();
        self.presence.join(&room_id).await?;
        self.subscribe_room(&room_id).await?;

        self.orchestrator.begin(room_id, assignment.role).await
    }

    async fn subscribe_room(&mut self, room_id: &RoomId) -> Result<(), SessionError> {
        self.stop_room_feed();
        self.generation += 1;
        let generation = self.generation;

        let mut feed = self.channel.subscribe(room_id).await?;
        let inbox = self.inbox_tx.clone();
        self.room_feed = Some(tokio::spawn(async move {
            while let Some(doc) = feed.recv().await {
                if inbox.send(Inbound::Room { generation, doc }).is_err() {
                    break;
                }
            }
        }));
        Ok(())
    }

    fn stop_room_feed(&mut self) {
        if let Some(feed) = self.room_feed.take() {
            feed.abort();
        }
        self.generation += 1;
    }

    async fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Room { generation, doc } => {
                if generation != self.generation {
                    return;
                }
                self.on_room_changed(doc).await;
            }
            Inbound::RemoteCandidate { epoch, record } => {
                let result = self.orchestrator.on_remote_candidate(epoch, record).await;
                self.report(result);
            }
            Inbound::Transport { epoch, event } => {
                match self.orchestrator.on_transport_event(epoch, event).await {
                    Ok(Some(data)) => self.receive(data),
                    Ok(None) => {}
                    Err(e) => self.report(Err(e)),
                }
            }
        }
    }

    async fn on_room_changed(&mut self, doc: Option<RoomDocument>) {
        let empty = BTreeSet::new();
        let joined = doc.as_ref().map_or(&empty, |d| &d.joined_users);
        let update = self.presence.observe(joined);
        self.set_status(update.status);

        if update.renegotiate {
            info!("{} left room, renegotiating", self.remote.id);
            self.renegotiate().await;
            return;
        }

        let result = self.orchestrator.on_room_changed(doc.as_ref()).await;
        self.report(result);
    }

    async fn send(
        &mut self,
        kind: MessageKind,
        body: String,
    ) -> Result<Option<ChatMessage>, SessionError> {
        let message =
            ChatMessage::new(&self.local.id, self.local.id.clone(), &self.local.name, body)
                .with_kind(kind);
        let payload = message
            .to_wire()
            .encode()
            .map_err(|e| SessionError::Encode(e.to_string()))?;

        if !self.orchestrator.send(Bytes::from(payload)).await {
            debug!("No open data channel to {}, message not sent", self.remote.id);
            return Ok(None);
        }
        self.bus.append(message.clone());
        Ok(Some(message))
    }

    fn receive(&mut self, data: Bytes) {
        let wire = WireMessage::decode(&data, &self.remote.name);
        let message = ChatMessage::from_wire(&self.local.id, self.remote.id.clone(), wire);
        debug!("{} received message {}", self.local.id, message.id);
        self.bus.append(message);
    }

    async fn leave_room(&mut self) {
        self.stop_room_feed();
        let Some(room_id) = self.room_id.take() else {
            return;
        };
        if let Err(e) = self.presence.leave(&room_id).await {
            debug!("Ignoring failed leave of {}: {}", room_id, e);
        }
    }

    async fn renegotiate(&mut self) {
        let _ = self.events.send(SessionEvent::Renegotiating);
        self.orchestrator.reset_for_renegotiation().await;
        self.leave_room().await;
        self.set_status(ConnectionStatus::Connecting);
        self.open_room(true).await;
    }

    fn set_status(&self, next: ConnectionStatus) {
        if self.status.send_replace(next) != next {
            info!("{} sees {} as {:?}", self.local.id, self.remote.id, next);
            let _ = self.events.send(SessionEvent::StatusChanged(next));
        }
    }

    async fn teardown(&mut self) {
        self.orchestrator.shutdown().await;
        self.leave_room().await;
        self.set_status(ConnectionStatus::Connecting);
        self.bus.close().await;
        let _ = self.events.send(SessionEvent::Closed);
        info!("Session {} -> {} closed", self.local.id, self.remote.id);
    }
}
