//! Tools that expose a chat's fact store to the model.

use std::sync::Arc;

use serde_json::{Value, json};
use switchboard_memory::FactStore;
use switchboard_types::{BoxFuture, Tool, ToolContext, ToolDefinition, ToolError, ToolOutput};
use uuid::Uuid;

pub const REMEMBER_FACT: &str = "remember_fact";
pub const RECALL_FACT: &str = "recall_fact";

fn chat_id(ctx: &ToolContext) -> Option<Uuid> {
    ctx.chat_id.as_deref().and_then(|id| Uuid::parse_str(id).ok())
}

fn unavailable() -> ToolOutput {
    ToolOutput::error("Memory is not available for this conversation")
}

/// Stores a key/value fact about the user or conversation.
pub struct RememberFactTool {
    store: Arc<dyn FactStore>,
}

impl RememberFactTool {
    pub fn new(store: Arc<dyn FactStore>) -> Self {
        Self { store }
    }
}

impl Tool for RememberFactTool {
    fn name(&self) -> &str {
        REMEMBER_FACT
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: REMEMBER_FACT.to_string(),
            description: "Remember a fact for the rest of this conversation and future ones, \
                          e.g. the user's name or preferences. Overwrites an existing fact \
                          with the same key."
                .to_string(),
            parameters: json!({
                "type": "object",
                "required": ["key", "value"],
                "properties": {
                    "key": {"type": "string", "description": "Short snake_case key"},
                    "value": {"type": "string", "description": "The fact to remember"}
                }
            }),
        }
    }

    fn execute(&self, input: Value, ctx: ToolContext) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let Some(chat_id) = chat_id(&ctx) else {
                return Ok(unavailable());
            };
            let key = input
                .get("key")
                .and_then(Value::as_str)
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| ToolError::InvalidInput {
                    tool: REMEMBER_FACT.to_string(),
                    message: "Missing required parameter: key".to_string(),
                })?;
            let value = match input.get("value") {
                Some(v) if !v.is_null() => v.clone(),
                _ => {
                    return Err(ToolError::InvalidInput {
                        tool: REMEMBER_FACT.to_string(),
                        message: "Missing required parameter: value".to_string(),
                    });
                }
            };

            self.store
                .set_fact(chat_id, key, value)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            tracing::debug!(role = %ctx.role, %key, "fact remembered");
            Ok(ToolOutput::text(format!("Remembered '{key}'")))
        })
    }
}

/// Reads one fact, or all of them when no key is given.
pub struct RecallFactTool {
    store: Arc<dyn FactStore>,
}

impl RecallFactTool {
    pub fn new(store: Arc<dyn FactStore>) -> Self {
        Self { store }
    }
}

impl Tool for RecallFactTool {
    fn name(&self) -> &str {
        RECALL_FACT
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: RECALL_FACT.to_string(),
            description: "Recall a previously remembered fact by key. Without a key, \
                          returns every remembered fact."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "key": {"type": "string", "description": "Key of the fact to recall"}
                }
            }),
        }
    }

    fn execute(&self, input: Value, ctx: ToolContext) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let Some(chat_id) = chat_id(&ctx) else {
                return Ok(unavailable());
            };
            let key = input.get("key").and_then(Value::as_str).filter(|k| !k.is_empty());
            let result = match key {
                Some(key) => self.store.get_fact(chat_id, key).await.map(|fact| match fact {
                    Some(value) => ToolOutput::value(value),
                    None => ToolOutput::text(format!("No fact stored under '{key}'")),
                }),
                None => self
                    .store
                    .get_all_facts(chat_id)
                    .await
                    .map(|facts| ToolOutput::value(json!(facts))),
            };
            result.map_err(|e| ToolError::ExecutionFailed(e.to_string()))
        })
    }
}
