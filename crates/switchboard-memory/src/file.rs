//! JSON file store: one file per chat under a directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use switchboard_types::{BoxFuture, Message};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::MemoryError;
use crate::store::{ChatRecord, ConversationStore, FactStore, SummaryEntry, SummaryStore};

/// Lifecycle of a [`JsonFileStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Directory not yet created.
    Uninitialized,
    Ready,
    Closed,
}

/// Stores each chat as `<dir>/<chat_id>.json`.
///
/// The directory is created lazily by the first operation. Writes are atomic
/// (.tmp then rename) and serialized within the process.
pub struct JsonFileStore {
    dir: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            state: Mutex::new(StoreState::Uninitialized),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn state(&self) -> StoreState {
        *self.state.lock().await
    }

    /// Move from `Uninitialized` to `Ready`, creating the directory.
    pub async fn ensure_ready(&self) -> Result<(), MemoryError> {
        let mut state = self.state.lock().await;
        Self::ready_locked(&self.dir, &mut state).await
    }

    async fn ready_locked(dir: &Path, state: &mut StoreState) -> Result<(), MemoryError> {
        match *state {
            StoreState::Ready => Ok(()),
            StoreState::Closed => Err(MemoryError::Closed),
            StoreState::Uninitialized => {
                tokio::fs::create_dir_all(dir).await?;
                tracing::debug!("Memory store ready at {}", dir.display());
                *state = StoreState::Ready;
                Ok(())
            }
        }
    }

    fn record_path(&self, chat_id: Uuid) -> PathBuf {
        self.dir.join(format!("{chat_id}.json"))
    }

    async fn load_record(&self, chat_id: Uuid) -> Result<ChatRecord, MemoryError> {
        let path = self.record_path(chat_id);
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => serde_json::from_str(&data).map_err(|e| MemoryError::Corrupt {
                chat_id,
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ChatRecord::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_record(&self, chat_id: Uuid, record: &ChatRecord) -> Result<(), MemoryError> {
        let path = self.record_path(chat_id);
        let tmp_path = path.with_extension("tmp");
        let json = serde_json::to_string_pretty(record)?;
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    async fn read<T>(&self, chat_id: Uuid, f: impl FnOnce(ChatRecord) -> T) -> Result<T, MemoryError> {
        let mut state = self.state.lock().await;
        Self::ready_locked(&self.dir, &mut state).await?;
        let record = self.load_record(chat_id).await?;
        Ok(f(record))
    }

    async fn update(&self, chat_id: Uuid, f: impl FnOnce(&mut ChatRecord)) -> Result<(), MemoryError> {
        let mut state = self.state.lock().await;
        Self::ready_locked(&self.dir, &mut state).await?;
        let mut record = self.load_record(chat_id).await?;
        f(&mut record);
        self.save_record(chat_id, &record).await
    }

    fn mark_closed(&self) -> BoxFuture<'_, Result<(), MemoryError>> {
        Box::pin(async move {
            *self.state.lock().await = StoreState::Closed;
            Ok(())
        })
    }
}

impl ConversationStore for JsonFileStore {
    fn append_message<'a>(
        &'a self,
        chat_id: Uuid,
        message: &'a Message,
    ) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(self.update(chat_id, move |r| r.messages.push(message.clone())))
    }

    fn load_history(&self, chat_id: Uuid) -> BoxFuture<'_, Result<Vec<Message>, MemoryError>> {
        Box::pin(self.read(chat_id, |r| r.messages))
    }

    fn clear_history(&self, chat_id: Uuid) -> BoxFuture<'_, Result<(), MemoryError>> {
        Box::pin(self.update(chat_id, |r| r.messages.clear()))
    }

    fn close(&self) -> BoxFuture<'_, Result<(), MemoryError>> {
        self.mark_closed()
    }
}

impl FactStore for JsonFileStore {
    fn set_fact<'a>(
        &'a self,
        chat_id: Uuid,
        key: &'a str,
        value: serde_json::Value,
    ) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(self.update(chat_id, move |r| {
            r.facts.insert(key.to_string(), value);
        }))
    }

    fn get_fact<'a>(
        &'a self,
        chat_id: Uuid,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<serde_json::Value>, MemoryError>> {
        Box::pin(self.read(chat_id, move |mut r| r.facts.remove(key)))
    }

    fn get_all_facts(
        &self,
        chat_id: Uuid,
    ) -> BoxFuture<'_, Result<BTreeMap<String, serde_json::Value>, MemoryError>> {
        Box::pin(self.read(chat_id, |r| r.facts))
    }

    fn close(&self) -> BoxFuture<'_, Result<(), MemoryError>> {
        self.mark_closed()
    }
}

impl SummaryStore for JsonFileStore {
    fn add_summary<'a>(
        &'a self,
        chat_id: Uuid,
        content: &'a str,
        timestamp: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(self.update(chat_id, move |r| {
            r.summaries.push(SummaryEntry {
                summary_content: content.to_string(),
                timestamp,
            })
        }))
    }

    fn get_latest_summary(&self, chat_id: Uuid) -> BoxFuture<'_, Result<Option<String>, MemoryError>> {
        Box::pin(self.read(chat_id, |r| r.latest_summary()))
    }

    fn get_all_summaries(
        &self,
        chat_id: Uuid,
        limit: Option<usize>,
    ) -> BoxFuture<'_, Result<Vec<SummaryEntry>, MemoryError>> {
        Box::pin(self.read(chat_id, move |r| r.summaries_newest_first(limit)))
    }

    fn close(&self) -> BoxFuture<'_, Result<(), MemoryError>> {
        self.mark_closed()
    }
}
