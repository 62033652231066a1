//! Process-local store for all three memory tracks.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use switchboard_types::{BoxFuture, Message};
use uuid::Uuid;

use crate::error::MemoryError;
use crate::store::{ChatRecord, ConversationStore, FactStore, SummaryEntry, SummaryStore};

/// Keeps every chat record in a map. Data is lost when the process exits.
#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<HashMap<Uuid, ChatRecord>>,
    closed: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chats with any stored data.
    pub fn chat_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    fn read<T>(&self, chat_id: Uuid, f: impl FnOnce(Option<&ChatRecord>) -> T) -> Result<T, MemoryError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MemoryError::Closed);
        }
        let records = self.records.lock().unwrap();
        Ok(f(records.get(&chat_id)))
    }

    fn write<T>(&self, chat_id: Uuid, f: impl FnOnce(&mut ChatRecord) -> T) -> Result<T, MemoryError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MemoryError::Closed);
        }
        let mut records = self.records.lock().unwrap();
        Ok(f(records.entry(chat_id).or_default()))
    }

    fn mark_closed(&self) -> BoxFuture<'_, Result<(), MemoryError>> {
        Box::pin(async move {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        })
    }
}

impl ConversationStore for InMemoryStore {
    fn append_message<'a>(
        &'a self,
        chat_id: Uuid,
        message: &'a Message,
    ) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(async move { self.write(chat_id, |r| r.messages.push(message.clone())) })
    }

    fn load_history(&self, chat_id: Uuid) -> BoxFuture<'_, Result<Vec<Message>, MemoryError>> {
        Box::pin(async move { self.read(chat_id, |r| r.map(|r| r.messages.clone()).unwrap_or_default()) })
    }

    fn clear_history(&self, chat_id: Uuid) -> BoxFuture<'_, Result<(), MemoryError>> {
        Box::pin(async move { self.write(chat_id, |r| r.messages.clear()) })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), MemoryError>> {
        self.mark_closed()
    }
}

impl FactStore for InMemoryStore {
    fn set_fact<'a>(
        &'a self,
        chat_id: Uuid,
        key: &'a str,
        value: serde_json::Value,
    ) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(async move {
            self.write(chat_id, |r| {
                r.facts.insert(key.to_string(), value);
            })
        })
    }

    fn get_fact<'a>(
        &'a self,
        chat_id: Uuid,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<serde_json::Value>, MemoryError>> {
        Box::pin(async move { self.read(chat_id, |r| r.and_then(|r| r.facts.get(key).cloned())) })
    }

    fn get_all_facts(
        &self,
        chat_id: Uuid,
    ) -> BoxFuture<'_, Result<BTreeMap<String, serde_json::Value>, MemoryError>> {
        Box::pin(async move { self.read(chat_id, |r| r.map(|r| r.facts.clone()).unwrap_or_default()) })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), MemoryError>> {
        self.mark_closed()
    }
}

impl SummaryStore for InMemoryStore {
    fn add_summary<'a>(
        &'a self,
        chat_id: Uuid,
        content: &'a str,
        timestamp: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(async move {
            self.write(chat_id, |r| {
                r.summaries.push(SummaryEntry {
                    summary_content: content.to_string(),
                    timestamp,
                })
            })
        })
    }

    fn get_latest_summary(&self, chat_id: Uuid) -> BoxFuture<'_, Result<Option<String>, MemoryError>> {
        Box::pin(async move { self.read(chat_id, |r| r.and_then(ChatRecord::latest_summary)) })
    }

    fn get_all_summaries(
        &self,
        chat_id: Uuid,
        limit: Option<usize>,
    ) -> BoxFuture<'_, Result<Vec<SummaryEntry>, MemoryError>> {
        Box::pin(async move {
            self.read(chat_id, |r| {
                r.map(|r| r.summaries_newest_first(limit)).unwrap_or_default()
            })
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), MemoryError>> {
        self.mark_closed()
    }
}
