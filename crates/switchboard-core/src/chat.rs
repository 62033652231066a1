//! ChatAgent: an agent with multi-turn history and optional persistent memory.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use switchboard_memory::{MemoryAdapters, SummaryEntry};
use switchboard_tools::ToolRegistry;
use switchboard_types::{Content, Message, Part, RoutingSignal, ToolContext, provider::Provider};
use uuid::Uuid;

use crate::agent::{Agent, TurnOutcome};
use crate::delegate::DelegateTaskTool;
use crate::loop_state::LoopLimits;
use crate::memory_tools::{RecallFactTool, RememberFactTool};
use crate::registry::AgentRegistry;

/// Everything needed to build a [`ChatAgent`] for a new session.
#[derive(Debug, Clone)]
pub struct ChatAgentConfig {
    pub role: String,
    pub objective: String,
    pub context: String,
    /// Model id; the registry's default model when absent.
    pub model: Option<String>,
    pub enable_google_search: bool,
    pub thinking_model: bool,
    pub enable_specialist_delegation: bool,
    pub enable_memory_tools: bool,
    pub limits: LoopLimits,
}

impl Default for ChatAgentConfig {
    fn default() -> Self {
        Self {
            role: "assistant".to_string(),
            objective: "Help the user".to_string(),
            context: String::new(),
            model: None,
            enable_google_search: false,
            thinking_model: false,
            enable_specialist_delegation: false,
            enable_memory_tools: false,
            limits: LoopLimits::default(),
        }
    }
}

impl ChatAgentConfig {
    /// Build a chat agent with `tools` plus the optional delegation and memory tools.
    pub fn build(
        &self,
        provider: Arc<dyn Provider>,
        tools: ToolRegistry,
        memory: MemoryAdapters,
        registry: Option<&Arc<AgentRegistry>>,
    ) -> ChatAgent {
        let agent = Agent::new(&self.role, &self.objective, &self.context, provider)
            .with_tools(tools)
            .with_google_search(self.enable_google_search)
            .with_thinking_model(self.thinking_model)
            .with_limits(self.limits.clone());
        let mut chat = ChatAgent::new(agent, memory);
        if self.enable_specialist_delegation {
            match registry {
                Some(registry) => chat = chat.with_delegation(Arc::clone(registry)),
                None => tracing::warn!(role = %self.role, "delegation enabled without a registry"),
            }
        }
        if self.enable_memory_tools {
            chat = chat.with_memory_tools();
        }
        chat
    }
}

/// An [`Agent`] that remembers the conversation.
///
/// History is kept in memory and, when a conversation store is configured,
/// appended to it. Every memory operation is best-effort: a missing store
/// yields `false`/`None`/empty, and a failing store is logged and treated the
/// same way. A turn never fails because of memory.
pub struct ChatAgent {
    agent: Agent,
    history: Vec<Message>,
    memory: MemoryAdapters,
    chat_id: Option<Uuid>,
}

impl ChatAgent {
    /// A `chat_id` is assigned only when at least one store is configured.
    pub fn new(agent: Agent, memory: MemoryAdapters) -> Self {
        let chat_id = memory.is_persistent().then(Uuid::new_v4);
        Self {
            agent,
            history: Vec::new(),
            memory,
            chat_id,
        }
    }

    /// Install `delegate_task_to_specialist` backed by `registry`.
    pub fn with_delegation(mut self, registry: Arc<AgentRegistry>) -> Self {
        if registry.known_roles().is_empty() {
            tracing::warn!(role = %self.agent.role(), "no specialists defined, delegation disabled");
            return self;
        }
        self.agent
            .tools_mut()
            .register(Arc::new(DelegateTaskTool::new(registry)));
        self
    }

    /// Install `remember_fact` and `recall_fact` when a fact store is configured.
    pub fn with_memory_tools(mut self) -> Self {
        match self.memory.facts.clone() {
            Some(store) => {
                let tools = self.agent.tools_mut();
                tools.register(Arc::new(RememberFactTool::new(Arc::clone(&store))));
                tools.register(Arc::new(RecallFactTool::new(store)));
            }
            None => tracing::debug!(role = %self.agent.role(), "memory tools need a fact store"),
        }
        self
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut Agent {
        &mut self.agent
    }

    pub fn role(&self) -> &str {
        self.agent.role()
    }

    pub fn chat_id(&self) -> Option<Uuid> {
        self.chat_id
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn memory(&self) -> &MemoryAdapters {
        &self.memory
    }

    /// Continue an existing persisted chat: adopt `chat_id` and reload its
    /// transcript. Returns `false` when nothing could be resumed.
    pub async fn resume(&mut self, chat_id: Uuid) -> bool {
        if !self.memory.is_persistent() {
            return false;
        }
        self.chat_id = Some(chat_id);
        let Some(store) = &self.memory.conversation else {
            return true;
        };
        match store.load_history(chat_id).await {
            Ok(history) => {
                tracing::debug!(%chat_id, messages = history.len(), "resumed chat");
                self.history = history;
                true
            }
            Err(e) => {
                tracing::warn!(%chat_id, "failed to load history: {e}");
                self.history.clear();
                false
            }
        }
    }

    /// Send a user message and return the reply text.
    pub async fn send_message(&mut self, message: &str) -> String {
        self.turn(message).await.text
    }

    /// Send a user message and return the full outcome, including any routing signal.
    ///
    /// Turns that hand the session to another agent are not recorded: the
    /// agent that ends up answering records the message instead.
    pub async fn turn(&mut self, message: &str) -> TurnOutcome {
        let history: Vec<Content> = self.history.iter().map(Content::from).collect();
        let ctx = ToolContext {
            role: self.agent.role().to_string(),
            chat_id: self.chat_id.map(|id| id.to_string()),
        };
        let outcome = self
            .agent
            .run_turn(history, vec![Part::text(message)], ctx)
            .await;

        let handed_off = matches!(
            outcome.signal,
            Some(RoutingSignal::RequestSubConversation { .. } | RoutingSignal::EndSubConversation(_))
        );
        if !handed_off {
            self.record(Message::user(message)).await;
            if !outcome.text.is_empty() {
                self.record(Message::model(outcome.text.clone())).await;
            }
        }
        outcome
    }

    async fn record(&mut self, message: Message) {
        if let (Some(store), Some(chat_id)) = (&self.memory.conversation, self.chat_id) {
            if let Err(e) = store.append_message(chat_id, &message).await {
                tracing::warn!(%chat_id, "failed to persist message: {e}");
            }
        }
        self.history.push(message);
    }

    /// Forget the transcript. Returns `true` when the stored transcript was
    /// cleared too.
    pub async fn clear_history(&mut self) -> bool {
        self.history.clear();
        let (Some(store), Some(chat_id)) = (&self.memory.conversation, self.chat_id) else {
            return false;
        };
        match store.clear_history(chat_id).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%chat_id, "failed to clear stored history: {e}");
                false
            }
        }
    }

    pub async fn set_fact(&self, key: &str, value: serde_json::Value) -> bool {
        let (Some(store), Some(chat_id)) = (&self.memory.facts, self.chat_id) else {
            return false;
        };
        match store.set_fact(chat_id, key, value).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%chat_id, %key, "failed to store fact: {e}");
                false
            }
        }
    }

    pub async fn get_fact(&self, key: &str) -> Option<serde_json::Value> {
        let (Some(store), Some(chat_id)) = (&self.memory.facts, self.chat_id) else {
            return None;
        };
        store.get_fact(chat_id, key).await.unwrap_or_else(|e| {
            tracing::warn!(%chat_id, %key, "failed to read fact: {e}");
            None
        })
    }

    pub async fn get_all_facts(&self) -> BTreeMap<String, serde_json::Value> {
        let (Some(store), Some(chat_id)) = (&self.memory.facts, self.chat_id) else {
            return BTreeMap::new();
        };
        store.get_all_facts(chat_id).await.unwrap_or_else(|e| {
            tracing::warn!(%chat_id, "failed to read facts: {e}");
            BTreeMap::new()
        })
    }

    /// Store a summary stamped with the current time.
    pub async fn add_summary(&self, content: &str) -> bool {
        let (Some(store), Some(chat_id)) = (&self.memory.summaries, self.chat_id) else {
            return false;
        };
        match store.add_summary(chat_id, content, Utc::now()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%chat_id, "failed to store summary: {e}");
                false
            }
        }
    }

    pub async fn get_latest_summary(&self) -> Option<String> {
        let (Some(store), Some(chat_id)) = (&self.memory.summaries, self.chat_id) else {
            return None;
        };
        store.get_latest_summary(chat_id).await.unwrap_or_else(|e| {
            tracing::warn!(%chat_id, "failed to read summary: {e}");
            None
        })
    }

    /// Summaries, newest first.
    pub async fn get_all_summaries(&self, limit: Option<usize>) -> Vec<SummaryEntry> {
        let (Some(store), Some(chat_id)) = (&self.memory.summaries, self.chat_id) else {
            return Vec::new();
        };
        store.get_all_summaries(chat_id, limit).await.unwrap_or_else(|e| {
            tracing::warn!(%chat_id, "failed to read summaries: {e}");
            Vec::new()
        })
    }
}
