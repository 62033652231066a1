//! Tool trait and related types.

use serde::{Deserialize, Serialize};

use crate::signal::RoutingSignal;
use crate::util::BoxFuture;
use crate::ToolDefinition;

/// Context provided to tools during execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Role of the agent invoking the tool.
    pub role: String,
    /// Persistent chat identifier of the invoking agent, if it has one.
    pub chat_id: Option<String>,
}

impl ToolContext {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            chat_id: None,
        }
    }
}

/// Result of executing a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Stringified result, fed back to the model.
    pub content: String,
    /// Whether the tool execution resulted in an error.
    pub is_error: bool,
    /// Routing signal for the chat manager. When present the function-call
    /// loop stops and hands the signal to its caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<RoutingSignal>,
}

impl ToolOutput {
    /// Create a successful text output.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: text.into(),
            is_error: false,
            signal: None,
        }
    }

    /// Create an error text output.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: text.into(),
            is_error: true,
            signal: None,
        }
    }

    /// Create a successful output from a JSON value. Strings are used as-is,
    /// everything else is serialized.
    pub fn value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Self::text(s),
            other => Self::text(other.to_string()),
        }
    }

    /// Create an output carrying a routing signal.
    pub fn signal(signal: RoutingSignal) -> Self {
        let content = serde_json::to_string(&signal).unwrap_or_default();
        Self {
            content,
            is_error: matches!(signal, RoutingSignal::SignalError { .. }),
            signal: Some(signal),
        }
    }
}

/// Trait that all tools must implement.
///
/// Tools are resolved by exact name during the function-call loop; names must
/// be unique within one agent's tool list.
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// The declaration sent to the model (name, description, parameter schema).
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the given JSON arguments and context.
    fn execute(
        &self,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolOutput, crate::error::ToolError>>;
}
