//! Routing signals emitted by the sub-conversation tools.
//!
//! Signals travel on [`ToolOutput::signal`](crate::ToolOutput) and are
//! intercepted by the chat manager; they are never shown to the user.

use serde::{Deserialize, Serialize};

/// A signal that changes which agent owns a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_signal_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingSignal {
    /// The coordinator hands the session to a specialist.
    RequestSubConversation {
        specialist_role: String,
        initial_context: String,
    },
    /// The active specialist hands the session back to the coordinator.
    EndSubConversation(SpecialistResult),
    /// A signal tool was invoked with missing or malformed arguments.
    SignalError {
        error: String,
        #[serde(rename = "originalArgs")]
        original_args: serde_json::Value,
    },
}

impl RoutingSignal {
    /// The wire tag of this signal.
    pub fn signal_type(&self) -> &'static str {
        match self {
            RoutingSignal::RequestSubConversation { .. } => "REQUEST_SUB_CONVERSATION",
            RoutingSignal::EndSubConversation(_) => "END_SUB_CONVERSATION",
            RoutingSignal::SignalError { .. } => "SIGNAL_ERROR",
        }
    }
}

/// Outcome reported by a specialist when it ends a sub-conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialistResult {
    pub status: String,
    pub final_result: serde_json::Value,
    pub last_user_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_to_coordinator: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn signals_are_tagged_on_the_wire() {
        let signal = RoutingSignal::RequestSubConversation {
            specialist_role: "billing".into(),
            initial_context: "refund for order 42".into(),
        };
        let value = serde_json::to_value(&signal).unwrap();
        assert_eq!(value["_signal_type"], "REQUEST_SUB_CONVERSATION");
        assert_eq!(value["specialist_role"], "billing");
        assert_eq!(signal.signal_type(), "REQUEST_SUB_CONVERSATION");
    }

    #[test]
    fn end_signal_flattens_result() {
        let signal = RoutingSignal::EndSubConversation(SpecialistResult {
            status: "completed".into(),
            final_result: json!({"refund": true}),
            last_user_message: "thanks".into(),
            message_to_coordinator: None,
        });
        let value = serde_json::to_value(&signal).unwrap();
        assert_eq!(value["_signal_type"], "END_SUB_CONVERSATION");
        assert_eq!(value["status"], "completed");
        assert!(value.get("message_to_coordinator").is_none());

        let back: RoutingSignal = serde_json::from_value(value).unwrap();
        assert_eq!(back, signal);
    }
}
