//! DelegateTaskTool — runs a specialist to completion inside the caller's turn.

use std::sync::Arc;

use serde_json::{Value, json};
use switchboard_types::{BoxFuture, Tool, ToolContext, ToolDefinition, ToolError, ToolOutput};

use crate::registry::AgentRegistry;

pub const DELEGATE_TASK: &str = "delegate_task_to_specialist";

/// A tool that hands a self-contained task to a specialist agent and returns
/// its final answer as the tool result.
///
/// Specialists are built from the registry without this tool, so delegation
/// never recurses. An unknown role is reported back to the model as error
/// text so it can pick a valid one.
pub struct DelegateTaskTool {
    registry: Arc<AgentRegistry>,
}

impl DelegateTaskTool {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self { registry }
    }
}

fn required_str<'a>(input: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    input
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidInput {
            tool: DELEGATE_TASK.to_string(),
            message: format!("Missing required parameter: {key}"),
        })
}

impl Tool for DelegateTaskTool {
    fn name(&self) -> &str {
        DELEGATE_TASK
    }

    fn definition(&self) -> ToolDefinition {
        let roles = self.registry.known_roles();
        ToolDefinition {
            name: DELEGATE_TASK.to_string(),
            description: format!(
                "Delegate a self-contained task to a specialist agent and get its answer back \
                 in this same turn. The specialist does not see this conversation, so the task \
                 description must include every detail it needs. Available specialists: {}.",
                roles.join(", ")
            ),
            parameters: json!({
                "type": "object",
                "required": ["specialist_role", "task_description"],
                "properties": {
                    "specialist_role": {
                        "type": "string",
                        "description": "Role of the specialist to delegate to",
                        "enum": roles,
                    },
                    "task_description": {
                        "type": "string",
                        "description": "Complete, self-contained description of the task"
                    }
                }
            }),
        }
    }

    fn execute(&self, input: Value, ctx: ToolContext) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let role = required_str(&input, "specialist_role")?;
            let task = required_str(&input, "task_description")?;

            let agent = match self.registry.get_agent(role) {
                Ok(agent) => agent,
                Err(e) => {
                    tracing::warn!(from = %ctx.role, "delegation failed: {e}");
                    return Ok(ToolOutput::error(e.to_string()));
                }
            };

            tracing::info!(from = %ctx.role, to = %role, "delegating task");
            let answer = agent.lock().await.execute(task).await;
            if answer.trim().is_empty() {
                return Ok(ToolOutput::error(format!(
                    "Specialist '{role}' completed but produced no text output"
                )));
            }
            Ok(ToolOutput::text(answer))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SpecialistDefinition;
    use switchboard_types::provider::{Provider, ProviderFactory};
    use switchboard_types::{ApiError, GenerateRequest, GenerateResponse};

    struct UpperProvider;

    impl Provider for UpperProvider {
        fn generate_content<'a>(
            &'a self,
            request: &'a GenerateRequest,
        ) -> BoxFuture<'a, Result<GenerateResponse, ApiError>> {
            let text = request.prompt_text().to_uppercase();
            Box::pin(async move { Ok(GenerateResponse::text(text)) })
        }

        fn name(&self) -> &str {
            "upper"
        }
    }

    struct UpperFactory;

    impl ProviderFactory for UpperFactory {
        fn create(&self, _model: &str) -> Result<Arc<dyn Provider>, ApiError> {
            Ok(Arc::new(UpperProvider))
        }
    }

    fn tool() -> DelegateTaskTool {
        let registry = AgentRegistry::new(Arc::new(UpperFactory), "m").with_definitions(vec![
            SpecialistDefinition {
                role: "shouter".into(),
                objective: "Shout".into(),
                context: String::new(),
                model: None,
                enable_google_search: false,
            },
        ]);
        DelegateTaskTool::new(Arc::new(registry))
    }

    #[test]
    fn definition_lists_roles() {
        let def = tool().definition();
        assert_eq!(def.name, DELEGATE_TASK);
        assert_eq!(def.parameters["properties"]["specialist_role"]["enum"], json!(["shouter"]));
        assert!(def.description.contains("shouter"));
    }

    #[tokio::test]
    async fn specialist_answer_becomes_result() {
        let output = tool()
            .execute(
                json!({"specialist_role": "shouter", "task_description": "hello"}),
                ToolContext::new("coordinator"),
            )
            .await
            .unwrap();
        assert!(!output.is_error);
        assert_eq!(output.content, "HELLO");
    }

    #[tokio::test]
    async fn unknown_role_is_error_text() {
        let output = tool()
            .execute(
                json!({"specialist_role": "whisperer", "task_description": "hello"}),
                ToolContext::new("coordinator"),
            )
            .await
            .unwrap();
        assert!(output.is_error);
        assert!(output.content.contains("Unknown specialist role 'whisperer'"));
        assert!(output.content.contains("shouter"));
    }

    #[tokio::test]
    async fn missing_task_is_invalid_input() {
        let result = tool()
            .execute(json!({"specialist_role": "shouter"}), ToolContext::new("coordinator"))
            .await;
        assert!(matches!(result, Err(ToolError::InvalidInput { .. })));
    }
}
