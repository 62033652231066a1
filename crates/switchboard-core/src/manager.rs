//! ChatManager: one ChatAgent per external session id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use switchboard_memory::MemoryAdapters;
use switchboard_tools::ToolRegistry;
use switchboard_types::provider::Provider;
use tracing::Instrument;

use crate::chat::{ChatAgent, ChatAgentConfig};
use crate::registry::AgentRegistry;

/// How sessions get their memory stores.
#[derive(Clone, Default)]
pub enum MemoryMode {
    /// History lives only in process memory.
    #[default]
    None,
    /// Every session uses the same stores.
    Shared(MemoryAdapters),
    /// Each session gets fresh stores from the factory.
    PerSession(Arc<dyn Fn() -> MemoryAdapters + Send + Sync>),
}

impl MemoryMode {
    /// Adapters for a session being created.
    pub fn for_new_session(&self) -> MemoryAdapters {
        match self {
            MemoryMode::None => MemoryAdapters::none(),
            MemoryMode::Shared(adapters) => adapters.clone(),
            MemoryMode::PerSession(factory) => factory(),
        }
    }

    /// Close shared stores and the given per-session ones.
    pub(crate) async fn close(&self, sessions: impl IntoIterator<Item = MemoryAdapters>) {
        match self {
            MemoryMode::None => {}
            MemoryMode::Shared(adapters) => adapters.close_all().await,
            MemoryMode::PerSession(_) => {
                for adapters in sessions {
                    adapters.close_all().await;
                }
            }
        }
    }

    /// Close a single ended session's stores. Shared stores stay open.
    pub(crate) async fn close_session(&self, adapters: MemoryAdapters) {
        if let MemoryMode::PerSession(_) = self {
            adapters.close_all().await;
        }
    }
}

impl std::fmt::Debug for MemoryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryMode::None => f.write_str("None"),
            MemoryMode::Shared(_) => f.write_str("Shared"),
            MemoryMode::PerSession(_) => f.write_str("PerSession"),
        }
    }
}

type SharedChat = Arc<tokio::sync::Mutex<ChatAgent>>;

struct ChatSession {
    chat: SharedChat,
    memory: MemoryAdapters,
}

/// Maps session ids to chat agents sharing one provider.
///
/// Different sessions run concurrently; turns within one session are
/// serialized.
pub struct ChatManager {
    config: ChatAgentConfig,
    provider: Arc<dyn Provider>,
    tools: ToolRegistry,
    registry: Option<Arc<AgentRegistry>>,
    memory: MemoryMode,
    sessions: Mutex<HashMap<String, ChatSession>>,
}

impl ChatManager {
    pub fn new(config: ChatAgentConfig, provider: Arc<dyn Provider>, memory: MemoryMode) -> Self {
        Self {
            config,
            provider,
            tools: ToolRegistry::new(),
            registry: None,
            memory,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Tools every session's agent starts with.
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Registry used for specialist delegation.
    pub fn with_registry(mut self, registry: Arc<AgentRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    fn chat_for(&self, session_id: &str) -> SharedChat {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(session) = sessions.get(session_id) {
            return Arc::clone(&session.chat);
        }
        let memory = self.memory.for_new_session();
        let chat = self.config.build(
            Arc::clone(&self.provider),
            self.tools.clone(),
            memory.clone(),
            self.registry.as_ref(),
        );
        tracing::info!(session = %session_id, chat_id = ?chat.chat_id(), "session created");
        let chat = Arc::new(tokio::sync::Mutex::new(chat));
        sessions.insert(
            session_id.to_string(),
            ChatSession {
                chat: Arc::clone(&chat),
                memory,
            },
        );
        chat
    }

    /// Route `message` to the session's agent and return its reply.
    pub async fn process_message(&self, session_id: &str, message: &str) -> String {
        let span = tracing::info_span!("chat.message", session = %session_id);
        async {
            let chat = self.chat_for(session_id);
            let mut chat = chat.lock().await;
            chat.send_message(message).await
        }
        .instrument(span)
        .await
    }

    /// Run `f` against the session's chat agent, creating the session if needed.
    pub async fn with_session<T>(
        &self,
        session_id: &str,
        f: impl AsyncFnOnce(&mut ChatAgent) -> T,
    ) -> T {
        let chat = self.chat_for(session_id);
        let mut chat = chat.lock().await;
        f(&mut *chat).await
    }

    pub fn has_session(&self, session_id: &str) -> bool {
        self.sessions.lock().unwrap().contains_key(session_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Drop the in-process session and close its per-session stores.
    /// Persisted history is left untouched.
    pub async fn end_session(&self, session_id: &str) -> bool {
        let Some(session) = self.sessions.lock().unwrap().remove(session_id) else {
            return false;
        };
        tracing::info!(session = %session_id, "session ended");
        self.memory.close_session(session.memory).await;
        true
    }

    /// Drop every session and close memory stores. Turns already running
    /// finish on their own.
    pub async fn shutdown(&self) {
        let drained: Vec<ChatSession> = {
            let mut sessions = self.sessions.lock().unwrap();
            sessions.drain().map(|(_, s)| s).collect()
        };
        tracing::debug!(sessions = drained.len(), "shutting down chat manager");
        self.memory
            .close(drained.into_iter().map(|s| s.memory))
            .await;
    }
}
