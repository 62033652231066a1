//! Sub-conversation tools that emit routing signals.
//!
//! These tools have no side effects of their own: they validate their
//! arguments and return a [`RoutingSignal`] for the chat manager to act on.
//! Missing arguments produce `SignalError`; an unknown specialist role is
//! reported back to the model as error text so it can retry.

use std::sync::Arc;

use serde_json::{Value, json};
use switchboard_types::{
    BoxFuture, RoutingSignal, SpecialistResult, Tool, ToolContext, ToolDefinition, ToolError,
    ToolOutput,
};

pub const REQUEST_SUB_CONVERSATION: &str = "request_sub_conversation";
pub const END_SUB_CONVERSATION: &str = "end_sub_conversation";

/// Source of the specialist roles a handoff may target.
///
/// Queried on every use, so a reconfigured directory is seen immediately.
pub trait RoleDirectory: Send + Sync {
    fn known_roles(&self) -> Vec<String>;
}

impl RoleDirectory for Vec<String> {
    fn known_roles(&self) -> Vec<String> {
        self.clone()
    }
}

/// Lets the coordinator hand the session over to a specialist.
pub struct RequestSubConversationTool {
    roles: Arc<dyn RoleDirectory>,
}

impl RequestSubConversationTool {
    pub fn new(roles: Arc<dyn RoleDirectory>) -> Self {
        Self { roles }
    }

    fn validate(&self, input: &Value) -> Result<RoutingSignal, ToolOutput> {
        let role = match required_str(input, "specialist_role") {
            Ok(role) => role,
            Err(error) => return Ok(signal_error(error, input)),
        };
        let initial_context = match required_str(input, "initial_context") {
            Ok(ctx) => ctx,
            Err(error) => return Ok(signal_error(error, input)),
        };

        let known_roles = self.roles.known_roles();
        if !known_roles.iter().any(|r| r == &role) {
            return Err(ToolOutput::error(format!(
                "Unknown specialist role '{role}'. Available roles: {}",
                known_roles.join(", ")
            )));
        }

        Ok(RoutingSignal::RequestSubConversation {
            specialist_role: role,
            initial_context,
        })
    }
}

impl Tool for RequestSubConversationTool {
    fn name(&self) -> &str {
        REQUEST_SUB_CONVERSATION
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: REQUEST_SUB_CONVERSATION.to_string(),
            description: "Hand the conversation over to a specialist agent. The specialist \
                          will talk to the user directly until it ends the sub-conversation. \
                          Use this when the user's request needs a specialist's expertise \
                          over several turns."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "specialist_role": {
                        "type": "string",
                        "description": "Role of the specialist to hand the conversation to",
                        "enum": self.roles.known_roles(),
                    },
                    "initial_context": {
                        "type": "string",
                        "description": "Everything the specialist needs to know to take over: \
                                        the user's goal and relevant details gathered so far"
                    }
                },
                "required": ["specialist_role", "initial_context"]
            }),
        }
    }

    fn execute(&self, input: Value, ctx: ToolContext) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            match self.validate(&input) {
                Ok(signal) => {
                    if let RoutingSignal::SignalError { error, .. } = &signal {
                        tracing::warn!(role = %ctx.role, %error, "invalid sub-conversation request");
                    }
                    Ok(ToolOutput::signal(signal))
                }
                Err(output) => {
                    tracing::debug!(role = %ctx.role, "sub-conversation requested for unknown role");
                    Ok(output)
                }
            }
        })
    }
}

/// Lets the active specialist hand the session back to the coordinator.
#[derive(Default)]
pub struct EndSubConversationTool;

impl EndSubConversationTool {
    pub fn new() -> Self {
        Self
    }

    fn validate(input: &Value) -> RoutingSignal {
        let status = match required_str(input, "status") {
            Ok(status) => status,
            Err(error) => return signal_error(error, input),
        };
        let final_result = match input.get("final_result") {
            Some(v) if !v.is_null() => v.clone(),
            _ => {
                return signal_error(
                    "Missing required argument 'final_result'".to_string(),
                    input,
                );
            }
        };
        let last_user_message = match required_str(input, "last_user_message") {
            Ok(msg) => msg,
            Err(error) => return signal_error(error, input),
        };
        let message_to_coordinator = input
            .get("message_to_coordinator")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string);

        RoutingSignal::EndSubConversation(SpecialistResult {
            status,
            final_result,
            last_user_message,
            message_to_coordinator,
        })
    }
}

impl Tool for EndSubConversationTool {
    fn name(&self) -> &str {
        END_SUB_CONVERSATION
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: END_SUB_CONVERSATION.to_string(),
            description: "End the current sub-conversation and hand the user back to the \
                          coordinator. Call this when your task is complete, cannot be \
                          completed, or the user asks for something outside your role."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "status": {
                        "type": "string",
                        "description": "Outcome of the sub-conversation",
                        "enum": ["completed", "cancelled", "failed", "out_of_scope"]
                    },
                    "final_result": {
                        "type": "object",
                        "description": "Structured result of the work done"
                    },
                    "last_user_message": {
                        "type": "string",
                        "description": "The user's most recent message, verbatim"
                    },
                    "message_to_coordinator": {
                        "type": "string",
                        "description": "Optional note for the coordinator"
                    }
                },
                "required": ["status", "final_result", "last_user_message"]
            }),
        }
    }

    fn execute(&self, input: Value, ctx: ToolContext) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let signal = Self::validate(&input);
            if let RoutingSignal::SignalError { error, .. } = &signal {
                tracing::warn!(role = %ctx.role, %error, "invalid end of sub-conversation");
            }
            Ok(ToolOutput::signal(signal))
        })
    }
}

fn required_str(input: &Value, key: &str) -> Result<String, String> {
    match input.get(key).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
        _ => Err(format!("Missing required argument '{key}'")),
    }
}

fn signal_error(error: String, input: &Value) -> RoutingSignal {
    RoutingSignal::SignalError {
        error,
        original_args: input.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_tool() -> RequestSubConversationTool {
        RequestSubConversationTool::new(Arc::new(vec!["billing".to_string(), "travel".to_string()]))
    }

    /// A directory whose roles can change after the tool is built.
    struct LiveRoles(std::sync::Mutex<Vec<String>>);

    impl RoleDirectory for LiveRoles {
        fn known_roles(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn request_checks_roles_at_call_time() {
        let roles = Arc::new(LiveRoles(std::sync::Mutex::new(vec!["billing".to_string()])));
        let tool = RequestSubConversationTool::new(roles.clone());
        let args = json!({"specialist_role": "billing", "initial_context": "refund"});

        let before = tool.execute(args.clone(), ToolContext::new("coordinator")).await.unwrap();
        assert!(before.signal.is_some());

        *roles.0.lock().unwrap() = vec!["travel".to_string()];
        let after = tool.execute(args, ToolContext::new("coordinator")).await.unwrap();
        assert!(after.signal.is_none());
        assert!(after.content.contains("Available roles: travel"));
        assert_eq!(
            tool.definition().parameters["properties"]["specialist_role"]["enum"],
            json!(["travel"])
        );
    }

    #[tokio::test]
    async fn request_emits_signal_for_known_role() {
        let output = request_tool()
            .execute(
                json!({"specialist_role": "billing", "initial_context": "refund order 42"}),
                ToolContext::new("coordinator"),
            )
            .await
            .unwrap();
        assert_eq!(
            output.signal,
            Some(RoutingSignal::RequestSubConversation {
                specialist_role: "billing".into(),
                initial_context: "refund order 42".into(),
            })
        );
    }

    #[tokio::test]
    async fn request_with_unknown_role_is_error_text_not_signal() {
        let output = request_tool()
            .execute(
                json!({"specialist_role": "astrology", "initial_context": "stars"}),
                ToolContext::new("coordinator"),
            )
            .await
            .unwrap();
        assert!(output.signal.is_none());
        assert!(output.is_error);
        assert!(output.content.contains("astrology"));
        assert!(output.content.contains("billing, travel"));
    }

    #[tokio::test]
    async fn request_missing_context_is_signal_error() {
        let args = json!({"specialist_role": "billing"});
        let output = request_tool()
            .execute(args.clone(), ToolContext::new("coordinator"))
            .await
            .unwrap();
        match output.signal {
            Some(RoutingSignal::SignalError { error, original_args }) => {
                assert!(error.contains("initial_context"));
                assert_eq!(original_args, args);
            }
            other => panic!("expected SignalError, got {other:?}"),
        }
    }

    #[test]
    fn request_definition_lists_roles() {
        let def = request_tool().definition();
        assert_eq!(
            def.parameters["properties"]["specialist_role"]["enum"],
            json!(["billing", "travel"])
        );
    }

    #[tokio::test]
    async fn end_emits_result() {
        let output = EndSubConversationTool::new()
            .execute(
                json!({
                    "status": "completed",
                    "final_result": {"refund_id": "R-9"},
                    "last_user_message": "great, thanks",
                    "message_to_coordinator": "refund issued"
                }),
                ToolContext::new("billing"),
            )
            .await
            .unwrap();
        match output.signal {
            Some(RoutingSignal::EndSubConversation(result)) => {
                assert_eq!(result.status, "completed");
                assert_eq!(result.final_result["refund_id"], "R-9");
                assert_eq!(result.last_user_message, "great, thanks");
                assert_eq!(result.message_to_coordinator.as_deref(), Some("refund issued"));
            }
            other => panic!("expected EndSubConversation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn end_missing_fields_is_signal_error() {
        let output = EndSubConversationTool::new()
            .execute(json!({"status": "completed"}), ToolContext::new("billing"))
            .await
            .unwrap();
        assert!(matches!(
            output.signal,
            Some(RoutingSignal::SignalError { ref error, .. }) if error.contains("final_result")
        ));
    }
}
