use crate::error::PersistenceError;
use crate::messaging::{MessagePersistence, merge_summary, upsert_message};
use async_trait::async_trait;
use duplex_core::{ConversationKey, ConversationSummary, PeerId, StoredMessage};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

const SUMMARIES_FILE: &str = "summaries.json";
const SUMMARIES_STAGING_FILE: &str = "summaries.json.tmp";

/// File-backed [`MessagePersistence`]: one `<conversationKey>.jsonl` per
/// conversation, appended to, plus a `summaries.json` keyed by summary id.
pub struct JsonlPersistence {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlPersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn conversation_path(&self, key: &ConversationKey) -> PathBuf {
        self.dir.join(format!("{}.jsonl", key))
    }

    async fn read_optional(path: &Path) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_summaries(&self) -> Result<BTreeMap<String, ConversationSummary>, PersistenceError> {
        match Self::read_optional(&self.dir.join(SUMMARIES_FILE)).await? {
            Some(content) => Ok(serde_json::from_str(&content)?),
            None => Ok(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl MessagePersistence for JsonlPersistence {
    async fn save_message(
        &self,
        key: &ConversationKey,
        message: StoredMessage,
    ) -> Result<(), PersistenceError> {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&self.dir).await?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.conversation_path(key))
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    async fn load_messages(
        &self,
        key: &ConversationKey,
    ) -> Result<Vec<StoredMessage>, PersistenceError> {
        let Some(content) = Self::read_optional(&self.conversation_path(key)).await? else {
            return Ok(Vec::new());
        };

        // Later lines for the same id replace earlier ones in place.
        let mut messages = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            upsert_message(&mut messages, serde_json::from_str(line)?);
        }
        debug!("Loaded {} messages of {}", messages.len(), key);
        Ok(messages)
    }

    async fn upsert_conversation_summary(
        &self,
        summary: ConversationSummary,
    ) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let mut summaries = self.read_summaries().await?;
        let id = summary.id();
        let merged = merge_summary(summaries.get(&id), summary);
        summaries.insert(id, merged);

        // Staged next to the target so the rename replaces it in one step.
        let staging = self.dir.join(SUMMARIES_STAGING_FILE);
        fs::create_dir_all(&self.dir).await?;
        fs::write(&staging, serde_json::to_vec_pretty(&summaries)?).await?;
        fs::rename(&staging, self.dir.join(SUMMARIES_FILE)).await?;
        Ok(())
    }

    async fn conversation_summaries(
        &self,
        owner: &PeerId,
    ) -> Result<Vec<ConversationSummary>, PersistenceError> {
        let mut summaries: Vec<ConversationSummary> = self
            .read_summaries()
            .await?
            .into_values()
            .filter(|s| &s.owner_id == owner)
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}
