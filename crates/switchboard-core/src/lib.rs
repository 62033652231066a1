//! Agent loop, chat agents and multi-agent routing for Switchboard.

pub mod agent;
pub mod chat;
pub mod delegate;
pub mod loop_state;
pub mod manager;
pub mod memory_tools;
pub mod registry;
pub mod routing;
pub mod thinking;

pub use agent::{Agent, TurnOutcome};
pub use chat::{ChatAgent, ChatAgentConfig};
pub use delegate::{DELEGATE_TASK, DelegateTaskTool};
pub use loop_state::{AbortReason, ITERATION_LIMIT_TEXT, LoopLimits, LoopPhase};
pub use manager::{ChatManager, MemoryMode};
pub use memory_tools::{RECALL_FACT, REMEMBER_FACT, RecallFactTool, RememberFactTool};
pub use registry::{AgentRegistry, RegistryError, SharedAgent, SpecialistDefinition};
pub use routing::{
    HANDOFF_LIMIT_TEXT, MAX_HANDOFF_HOPS, PendingResult, RoutingChatManager, RoutingState,
    SIGNAL_ERROR_TEXT, SessionSnapshot,
};
pub use thinking::{ThinkingResponse, parse_thinking_response};
