//! RoutingChatManager: sub-conversation handoff between a coordinator and
//! specialist agents.
//!
//! Per session the manager is either `CoordinatorActive` or
//! `SpecialistActive(role)`. The coordinator starts a sub-conversation with
//! `request_sub_conversation`; the specialist ends it with
//! `end_sub_conversation`. In both cases the user message that triggered the
//! signal is re-dispatched to the newly active agent, so every message gets
//! exactly one visible answer. A specialist's result is held as a pending
//! result and delivered to the coordinator once, as a note prepended to the
//! next message it receives.
//!
//! When the registry is reconfigured, a session drops the specialists it
//! built from the old configuration before handling its next message.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use switchboard_memory::MemoryAdapters;
use switchboard_tools::{EndSubConversationTool, RequestSubConversationTool, RoleDirectory, ToolRegistry};
use switchboard_types::{RoutingSignal, SpecialistResult, provider::Provider};
use tracing::Instrument;

use crate::agent::TurnOutcome;
use crate::chat::{ChatAgent, ChatAgentConfig};
use crate::manager::MemoryMode;
use crate::registry::{AgentRegistry, RegistryError};

/// Agent dispatches allowed per `process_message` call.
pub const MAX_HANDOFF_HOPS: usize = 4;

/// Returned when a signal was malformed and the agent produced no text.
pub const SIGNAL_ERROR_TEXT: &str =
    "Sorry, something went wrong while routing your request. Could you rephrase it?";

/// Returned when agents keep handing the message back and forth.
pub const HANDOFF_LIMIT_TEXT: &str =
    "Sorry, I couldn't find the right agent to answer that. Could you rephrase your request?";

/// Which agent receives the next user message of a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoutingState {
    #[default]
    CoordinatorActive,
    SpecialistActive(String),
}

impl RoutingState {
    /// Role of the active specialist, if any.
    pub fn specialist_role(&self) -> Option<&str> {
        match self {
            RoutingState::CoordinatorActive => None,
            RoutingState::SpecialistActive(role) => Some(role),
        }
    }
}

impl fmt::Display for RoutingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingState::CoordinatorActive => f.write_str("coordinator"),
            RoutingState::SpecialistActive(role) => write!(f, "specialist '{role}'"),
        }
    }
}

/// A specialist's end-of-delegation payload awaiting delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingResult {
    pub ended_specialist_role: String,
    pub result: SpecialistResult,
}

impl PendingResult {
    /// The note prepended to the coordinator's next message.
    pub fn system_note(&self) -> String {
        let mut note = format!(
            "[System note: the '{}' specialist ended its sub-conversation with status '{}'. \
             Result: {}.",
            self.ended_specialist_role, self.result.status, self.result.final_result
        );
        if let Some(msg) = &self.result.message_to_coordinator {
            note.push_str(&format!(" Message for you: {msg}."));
        }
        note.push_str(" Continue with the user's message below.]");
        note
    }
}

/// Read-only view of a session's routing state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: RoutingState,
    /// Specialists instantiated in this session, sorted.
    pub specialist_roles: Vec<String>,
    pub has_pending_result: bool,
}

struct SessionState {
    coordinator: ChatAgent,
    active: RoutingState,
    specialists: BTreeMap<String, ChatAgent>,
    pending: Option<PendingResult>,
    memory: MemoryAdapters,
    /// Registry generation the specialists were built from.
    generation: u64,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.active.clone(),
            specialist_roles: self.specialists.keys().cloned().collect(),
            has_pending_result: self.pending.is_some(),
        }
    }
}

struct RoutingSession {
    state: Arc<tokio::sync::Mutex<SessionState>>,
    memory: MemoryAdapters,
}

/// A chat manager whose sessions can be handed over to specialists for
/// several turns.
pub struct RoutingChatManager {
    coordinator: ChatAgentConfig,
    coordinator_provider: Arc<dyn Provider>,
    tools: ToolRegistry,
    registry: Arc<AgentRegistry>,
    memory: MemoryMode,
    sessions: Mutex<HashMap<String, RoutingSession>>,
}

impl RoutingChatManager {
    /// Specialists come from `registry`; the coordinator runs on its
    /// configured model or the registry's default.
    pub fn new(
        coordinator: ChatAgentConfig,
        registry: Arc<AgentRegistry>,
        memory: MemoryMode,
    ) -> Result<Self, RegistryError> {
        let model = coordinator
            .model
            .clone()
            .unwrap_or_else(|| registry.default_model().to_string());
        let coordinator_provider = registry.provider_for(&model)?;
        Ok(Self {
            coordinator,
            coordinator_provider,
            tools: ToolRegistry::new(),
            registry,
            memory,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Extra tools for the coordinator.
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    fn session(&self, session_id: &str) -> Arc<tokio::sync::Mutex<SessionState>> {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(session) = sessions.get(session_id) {
            return Arc::clone(&session.state);
        }

        let memory = self.memory.for_new_session();
        let mut tools = self.tools.clone();
        tools.register(Arc::new(RequestSubConversationTool::new(
            Arc::clone(&self.registry) as Arc<dyn RoleDirectory>,
        )));
        let coordinator = self.coordinator.build(
            Arc::clone(&self.coordinator_provider),
            tools,
            memory.clone(),
            Some(&self.registry),
        );
        tracing::info!(session = %session_id, "routing session created");

        let state = Arc::new(tokio::sync::Mutex::new(SessionState {
            coordinator,
            active: RoutingState::CoordinatorActive,
            specialists: BTreeMap::new(),
            pending: None,
            memory: memory.clone(),
            generation: self.registry.generation(),
        }));
        sessions.insert(
            session_id.to_string(),
            RoutingSession {
                state: Arc::clone(&state),
                memory,
            },
        );
        state
    }

    /// Deliver `message` to whichever agent owns the session and return the
    /// reply the user should see.
    pub async fn process_message(&self, session_id: &str, message: &str) -> String {
        let span = tracing::info_span!("chat.message", session = %session_id);
        async {
            let session = self.session(session_id);
            let mut state = session.lock().await;
            self.refresh_specialists(&mut state);
            self.route(&mut state, message).await
        }
        .instrument(span)
        .await
    }

    /// Forget specialists built before the registry last changed.
    fn refresh_specialists(&self, state: &mut SessionState) {
        let generation = self.registry.generation();
        if state.generation == generation {
            return;
        }
        tracing::info!(
            dropped = state.specialists.len(),
            "specialist configuration changed, rebuilding session specialists"
        );
        state.generation = generation;
        state.specialists.clear();
        let Some(role) = state.active.specialist_role().map(str::to_string) else {
            return;
        };
        match self.build_specialist(&role, &state.memory) {
            Ok(specialist) => {
                state.specialists.insert(role, specialist);
            }
            Err(e) => {
                tracing::warn!(%role, "active specialist unavailable, returning to coordinator: {e}");
                state.active = RoutingState::CoordinatorActive;
            }
        }
    }

    async fn route(&self, state: &mut SessionState, message: &str) -> String {
        for hop in 0..MAX_HANDOFF_HOPS {
            let outcome = self.dispatch(state, message).await;
            let Some(signal) = outcome.signal else {
                return outcome.text;
            };
            tracing::debug!(hop, signal = signal.signal_type(), active = %state.active, "routing signal");

            match signal {
                RoutingSignal::RequestSubConversation {
                    specialist_role,
                    initial_context,
                } => {
                    if let Err(e) = self.start_sub_conversation(state, &specialist_role, &initial_context) {
                        tracing::warn!(role = %specialist_role, "handoff failed: {e}");
                        return non_empty_or(outcome.text, SIGNAL_ERROR_TEXT);
                    }
                    tracing::info!(role = %specialist_role, "sub-conversation started");
                }
                RoutingSignal::EndSubConversation(result) => {
                    let RoutingState::SpecialistActive(ended) = std::mem::take(&mut state.active) else {
                        tracing::warn!(
                            status = %result.status,
                            "end of sub-conversation signalled by the coordinator, ignoring"
                        );
                        return non_empty_or(outcome.text, SIGNAL_ERROR_TEXT);
                    };
                    tracing::info!(role = %ended, status = %result.status, "sub-conversation ended");
                    state.pending = Some(PendingResult {
                        ended_specialist_role: ended,
                        result,
                    });
                }
                RoutingSignal::SignalError { error, .. } => {
                    tracing::warn!(signal = "SIGNAL_ERROR", active = %state.active, %error, "malformed routing signal");
                    return non_empty_or(outcome.text, SIGNAL_ERROR_TEXT);
                }
            }
        }

        tracing::warn!(hops = MAX_HANDOFF_HOPS, "handoff limit reached, returning to coordinator");
        state.active = RoutingState::CoordinatorActive;
        HANDOFF_LIMIT_TEXT.to_string()
    }

    /// One agent call for the current state.
    async fn dispatch(&self, state: &mut SessionState, message: &str) -> TurnOutcome {
        if let RoutingState::SpecialistActive(role) = &state.active {
            if let Some(specialist) = state.specialists.get_mut(role) {
                return specialist.turn(message).await;
            }
            tracing::warn!(%role, "active specialist missing, returning to coordinator");
            state.active = RoutingState::CoordinatorActive;
        }

        // Cleared before the call so a result is never delivered twice.
        let prompt = match state.pending.take() {
            Some(pending) => format!("{}\n\n{message}", pending.system_note()),
            None => message.to_string(),
        };
        state.coordinator.turn(&prompt).await
    }

    fn start_sub_conversation(
        &self,
        state: &mut SessionState,
        role: &str,
        initial_context: &str,
    ) -> Result<(), RegistryError> {
        let handoff = format!("Handoff context from the coordinator: {initial_context}");
        match state.specialists.get_mut(role) {
            Some(specialist) => specialist.agent_mut().append_context(&handoff),
            None => {
                let mut specialist = self.build_specialist(role, &state.memory)?;
                specialist.agent_mut().append_context(&handoff);
                state.specialists.insert(role.to_string(), specialist);
            }
        }
        state.active = RoutingState::SpecialistActive(role.to_string());
        Ok(())
    }

    /// A session-scoped specialist with its registry tools plus the end signal.
    fn build_specialist(&self, role: &str, memory: &MemoryAdapters) -> Result<ChatAgent, RegistryError> {
        let definition = self.registry.validate_role(role)?;
        let provider = self
            .registry
            .provider_for(&self.registry.model_for(&definition))?;
        let config = ChatAgentConfig {
            role: definition.role.clone(),
            objective: definition.objective.clone(),
            context: definition.context.clone(),
            model: definition.model.clone(),
            enable_google_search: definition.enable_google_search,
            limits: self.registry.limits().clone(),
            ..ChatAgentConfig::default()
        };
        let mut tools = self.registry.tools_for(role);
        tools.register(Arc::new(EndSubConversationTool::new()));
        Ok(config.build(provider, tools, memory.clone(), None))
    }

    /// Routing state of a session, or `None` if it does not exist.
    pub async fn session_state(&self, session_id: &str) -> Option<SessionSnapshot> {
        let session = {
            let sessions = self.sessions.lock().unwrap();
            Arc::clone(&sessions.get(session_id)?.state)
        };
        let state = session.lock().await;
        Some(state.snapshot())
    }

    pub fn has_session(&self, session_id: &str) -> bool {
        self.sessions.lock().unwrap().contains_key(session_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Drop the in-process session, including its specialists and any
    /// undelivered result, and close its per-session stores. Persisted
    /// history is left untouched.
    pub async fn end_session(&self, session_id: &str) -> bool {
        let Some(session) = self.sessions.lock().unwrap().remove(session_id) else {
            return false;
        };
        tracing::info!(session = %session_id, "routing session ended");
        self.memory.close_session(session.memory).await;
        true
    }

    /// Drop every session and close memory stores.
    pub async fn shutdown(&self) {
        let drained: Vec<RoutingSession> = {
            let mut sessions = self.sessions.lock().unwrap();
            sessions.drain().map(|(_, s)| s).collect()
        };
        tracing::debug!(sessions = drained.len(), "shutting down routing manager");
        self.memory
            .close(drained.into_iter().map(|s| s.memory))
            .await;
    }
}

fn non_empty_or(text: String, fallback: &str) -> String {
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(message: Option<&str>) -> PendingResult {
        PendingResult {
            ended_specialist_role: "billing".into(),
            result: SpecialistResult {
                status: "completed".into(),
                final_result: json!({"refund_id": "R-9"}),
                last_user_message: "thanks".into(),
                message_to_coordinator: message.map(str::to_string),
            },
        }
    }

    #[test]
    fn system_note_carries_result() {
        let note = result(Some("refund issued")).system_note();
        assert!(note.starts_with("[System note: the 'billing' specialist"));
        assert!(note.contains("status 'completed'"));
        assert!(note.contains(r#"{"refund_id":"R-9"}"#));
        assert!(note.contains("Message for you: refund issued."));
    }

    #[test]
    fn system_note_without_message() {
        assert!(!result(None).system_note().contains("Message for you"));
    }

    #[test]
    fn routing_state_display() {
        assert_eq!(RoutingState::CoordinatorActive.to_string(), "coordinator");
        let state = RoutingState::SpecialistActive("travel".into());
        assert_eq!(state.to_string(), "specialist 'travel'");
        assert_eq!(state.specialist_role(), Some("travel"));
    }

    #[test]
    fn empty_text_falls_back() {
        assert_eq!(non_empty_or("  ".into(), "fallback"), "fallback");
        assert_eq!(non_empty_or("answer".into(), "fallback"), "answer");
    }
}
