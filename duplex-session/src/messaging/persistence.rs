use crate::error::PersistenceError;
use async_trait::async_trait;
use dashmap::DashMap;
use duplex_core::{ConversationKey, ConversationSummary, PeerId, StoredMessage};
use std::sync::atomic::{AtomicBool, Ordering};

/// Storage for chat history, outside the connection core.
#[async_trait]
pub trait MessagePersistence: Send + Sync {
    /// Saving a message id that is already stored replaces it in place.
    async fn save_message(
        &self,
        key: &ConversationKey,
        message: StoredMessage,
    ) -> Result<(), PersistenceError>;

    /// Messages of a conversation in the order they were first saved.
    async fn load_messages(
        &self,
        key: &ConversationKey,
    ) -> Result<Vec<StoredMessage>, PersistenceError>;

    /// Inserts or updates the summary. An existing `created_at` is kept.
    async fn upsert_conversation_summary(
        &self,
        summary: ConversationSummary,
    ) -> Result<(), PersistenceError>;

    /// Summaries owned by `owner`, most recently updated first.
    async fn conversation_summaries(
        &self,
        owner: &PeerId,
    ) -> Result<Vec<ConversationSummary>, PersistenceError>;
}

pub(crate) fn merge_summary(
    existing: Option<&ConversationSummary>,
    mut summary: ConversationSummary,
) -> ConversationSummary {
    if let Some(existing) = existing {
        summary.created_at = existing.created_at;
    }
    summary
}

pub(crate) fn upsert_message(messages: &mut Vec<StoredMessage>, message: StoredMessage) {
    match messages.iter_mut().find(|m| m.id == message.id) {
        Some(slot) => *slot = message,
        None => messages.push(message),
    }
}

/// Process-local [`MessagePersistence`]. Can be switched to failing mode to
/// exercise the error path.
#[derive(Default)]
pub struct InMemoryPersistence {
    messages: DashMap<ConversationKey, Vec<StoredMessage>>,
    summaries: DashMap<String, ConversationSummary>,
    failing: AtomicBool,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "persistence is failing".to_owned(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MessagePersistence for InMemoryPersistence {
    async fn save_message(
        &self,
        key: &ConversationKey,
        message: StoredMessage,
    ) -> Result<(), PersistenceError> {
        self.ensure_available()?;
        upsert_message(&mut self.messages.entry(key.clone()).or_default(), message);
        Ok(())
    }

    async fn load_messages(
        &self,
        key: &ConversationKey,
    ) -> Result<Vec<StoredMessage>, PersistenceError> {
        self.ensure_available()?;
        Ok(self
            .messages
            .get(key)
            .map(|messages| messages.clone())
            .unwrap_or_default())
    }

    async fn upsert_conversation_summary(
        &self,
        summary: ConversationSummary,
    ) -> Result<(), PersistenceError> {
        self.ensure_available()?;
        let id = summary.id();
        let merged = merge_summary(self.summaries.get(&id).as_deref(), summary);
        self.summaries.insert(id, merged);
        Ok(())
    }

    async fn conversation_summaries(
        &self,
        owner: &PeerId,
    ) -> Result<Vec<ConversationSummary>, PersistenceError> {
        self.ensure_available()?;
        let mut summaries: Vec<ConversationSummary> = self
            .summaries
            .iter()
            .filter(|entry| &entry.owner_id == owner)
            .map(|entry| entry.value().clone())
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}
