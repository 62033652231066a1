//! Store traits and the per-agent adapter bundle.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use switchboard_types::{BoxFuture, Message};
use uuid::Uuid;

use crate::error::MemoryError;

/// A stored conversation summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub summary_content: String,
    pub timestamp: DateTime<Utc>,
}

/// Persistent conversation transcript, keyed by chat id.
pub trait ConversationStore: Send + Sync {
    fn append_message<'a>(
        &'a self,
        chat_id: Uuid,
        message: &'a Message,
    ) -> BoxFuture<'a, Result<(), MemoryError>>;

    /// Full transcript, oldest first.
    fn load_history(&self, chat_id: Uuid) -> BoxFuture<'_, Result<Vec<Message>, MemoryError>>;

    fn clear_history(&self, chat_id: Uuid) -> BoxFuture<'_, Result<(), MemoryError>>;

    fn close(&self) -> BoxFuture<'_, Result<(), MemoryError>>;
}

/// Key/value facts, keyed by chat id.
pub trait FactStore: Send + Sync {
    fn set_fact<'a>(
        &'a self,
        chat_id: Uuid,
        key: &'a str,
        value: serde_json::Value,
    ) -> BoxFuture<'a, Result<(), MemoryError>>;

    fn get_fact<'a>(
        &'a self,
        chat_id: Uuid,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<serde_json::Value>, MemoryError>>;

    fn get_all_facts(
        &self,
        chat_id: Uuid,
    ) -> BoxFuture<'_, Result<BTreeMap<String, serde_json::Value>, MemoryError>>;

    fn close(&self) -> BoxFuture<'_, Result<(), MemoryError>>;
}

/// Timestamped summaries, keyed by chat id.
pub trait SummaryStore: Send + Sync {
    fn add_summary<'a>(
        &'a self,
        chat_id: Uuid,
        content: &'a str,
        timestamp: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<(), MemoryError>>;

    /// Content of the most recent summary.
    fn get_latest_summary(&self, chat_id: Uuid) -> BoxFuture<'_, Result<Option<String>, MemoryError>>;

    /// Summaries, newest first, at most `limit` when given.
    fn get_all_summaries(
        &self,
        chat_id: Uuid,
        limit: Option<usize>,
    ) -> BoxFuture<'_, Result<Vec<SummaryEntry>, MemoryError>>;

    fn close(&self) -> BoxFuture<'_, Result<(), MemoryError>>;
}

/// The optional stores attached to one chat agent.
#[derive(Clone, Default)]
pub struct MemoryAdapters {
    pub conversation: Option<Arc<dyn ConversationStore>>,
    pub facts: Option<Arc<dyn FactStore>>,
    pub summaries: Option<Arc<dyn SummaryStore>>,
}

impl MemoryAdapters {
    /// No persistence at all: history lives only in process memory.
    pub fn none() -> Self {
        Self::default()
    }

    /// Use one store for all three tracks.
    pub fn all<S>(store: Arc<S>) -> Self
    where
        S: ConversationStore + FactStore + SummaryStore + 'static,
    {
        Self {
            conversation: Some(store.clone() as Arc<dyn ConversationStore>),
            facts: Some(store.clone() as Arc<dyn FactStore>),
            summaries: Some(store as Arc<dyn SummaryStore>),
        }
    }

    /// Whether at least one track is persisted.
    pub fn is_persistent(&self) -> bool {
        self.conversation.is_some() || self.facts.is_some() || self.summaries.is_some()
    }

    /// Close every configured store. Failures are logged, not returned.
    pub async fn close_all(&self) {
        if let Some(store) = &self.conversation {
            if let Err(e) = store.close().await {
                tracing::warn!("Failed to close conversation store: {e}");
            }
        }
        if let Some(store) = &self.facts {
            if let Err(e) = store.close().await {
                tracing::warn!("Failed to close fact store: {e}");
            }
        }
        if let Some(store) = &self.summaries {
            if let Err(e) = store.close().await {
                tracing::warn!("Failed to close summary store: {e}");
            }
        }
    }
}

/// Everything stored for one chat id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct ChatRecord {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub facts: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub summaries: Vec<SummaryEntry>,
}

impl ChatRecord {
    pub fn latest_summary(&self) -> Option<String> {
        self.summaries
            .iter()
            .max_by_key(|s| s.timestamp)
            .map(|s| s.summary_content.clone())
    }

    pub fn summaries_newest_first(&self, limit: Option<usize>) -> Vec<SummaryEntry> {
        let mut all = self.summaries.clone();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = limit {
            all.truncate(limit);
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn none_is_not_persistent() {
        assert!(!MemoryAdapters::none().is_persistent());
    }

    #[test]
    fn summaries_are_ordered_newest_first() {
        let now = Utc::now();
        let record = ChatRecord {
            summaries: vec![
                SummaryEntry {
                    summary_content: "old".into(),
                    timestamp: now - Duration::hours(2),
                },
                SummaryEntry {
                    summary_content: "new".into(),
                    timestamp: now,
                },
                SummaryEntry {
                    summary_content: "mid".into(),
                    timestamp: now - Duration::hours(1),
                },
            ],
            ..Default::default()
        };
        assert_eq!(record.latest_summary().as_deref(), Some("new"));
        let two: Vec<_> = record
            .summaries_newest_first(Some(2))
            .into_iter()
            .map(|s| s.summary_content)
            .collect();
        assert_eq!(two, vec!["new", "mid"]);
    }
}
