use crate::error::PersistenceError;
use crate::messaging::MessagePersistence;
use crate::session::SessionEvent;
use chrono::Utc;
use duplex_core::{ChatMessage, ConversationKey, ConversationSummary, PeerProfile, StoredMessage};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Ordered in-memory chat log of one conversation.
///
/// Appends are visible to observers immediately and mirrored to persistence
/// in the background, in append order. A failed write is logged and the
/// message stays in the log.
pub struct MessageBus {
    local: PeerProfile,
    key: ConversationKey,
    log: watch::Sender<Vec<ChatMessage>>,
    events: broadcast::Sender<SessionEvent>,
    persistence: Arc<dyn MessagePersistence>,
    mirror: Option<mpsc::UnboundedSender<ChatMessage>>,
    writer: Option<JoinHandle<()>>,
}

impl MessageBus {
    pub fn new(
        local: PeerProfile,
        remote: PeerProfile,
        persistence: Arc<dyn MessagePersistence>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let key = ConversationKey::for_peers(&local.id, &remote.id);
        let (log, _) = watch::channel(Vec::new());
        let (mirror, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(mirror_messages(
            rx,
            persistence.clone(),
            key.clone(),
            local.clone(),
            remote,
        ));

        Self {
            local,
            key,
            log,
            events,
            persistence,
            mirror: Some(mirror),
            writer: Some(writer),
        }
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.log.subscribe()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.log.borrow().clone()
    }

    pub fn append(&self, message: ChatMessage) {
        self.log.send_modify(|log| log.push(message.clone()));
        let _ = self.events.send(SessionEvent::MessageAppended(message.clone()));

        match &self.mirror {
            Some(mirror) if mirror.send(message).is_ok() => {}
            _ => warn!("Message log of {} is no longer mirrored", self.key),
        }
    }

    /// Puts the stored conversation ahead of anything already in the log.
    /// Ownership of each stored message is decided here, for the local peer.
    pub async fn load_history(&self) -> Result<usize, PersistenceError> {
        let stored = self.persistence.load_messages(&self.key).await?;
        let count = stored.len();
        let history: Vec<ChatMessage> = stored
            .into_iter()
            .map(|m| m.into_message(&self.local.id))
            .collect();

        self.log.send_modify(|log| {
            let live = std::mem::take(log);
            *log = history;
            for message in live {
                if !log.iter().any(|m| m.id == message.id) {
                    log.push(message);
                }
            }
        });
        debug!("Loaded {} stored messages of {}", count, self.key);
        Ok(count)
    }

    /// Stops mirroring and waits for pending writes.
    pub async fn close(&mut self) {
        self.mirror.take();
        if let Some(writer) = self.writer.take()
            && let Err(e) = writer.await
        {
            warn!("Message writer of {} failed: {}", self.key, e);
        }
    }
}

async fn mirror_messages(
    mut rx: mpsc::UnboundedReceiver<ChatMessage>,
    persistence: Arc<dyn MessagePersistence>,
    key: ConversationKey,
    local: PeerProfile,
    remote: PeerProfile,
) {
    while let Some(message) = rx.recv().await {
        let receiver = if message.is_from_me() {
            &remote.id
        } else {
            &local.id
        };
        let stored = StoredMessage::from_message(&message, receiver);
        if let Err(e) = persistence.save_message(&key, stored).await {
            warn!("Failed to persist message {}: {}", message.id, e);
            continue;
        }

        let now = Utc::now();
        for (owner, other) in [(&local, &remote), (&remote, &local)] {
            let summary = ConversationSummary {
                owner_id: owner.id.clone(),
                other_id: other.id.clone(),
                other_name: other.name.clone(),
                last_message: message.body.clone(),
                last_message_sender_id: message.sender_id.clone(),
                last_message_at: message.timestamp,
                created_at: now,
                updated_at: now,
            };
            if let Err(e) = persistence.upsert_conversation_summary(summary).await {
                warn!("Failed to update conversation summary of {}: {}", owner.id, e);
            }
        }
    }
}
