//! One front door over the routing and the plain chat managers.

use switchboard_core::{ChatManager, RoutingChatManager};

pub enum Router {
    Routing(RoutingChatManager),
    Plain(ChatManager),
}

impl Router {
    pub async fn process_message(&self, session_id: &str, message: &str) -> String {
        match self {
            Router::Routing(manager) => manager.process_message(session_id, message).await,
            Router::Plain(manager) => manager.process_message(session_id, message).await,
        }
    }

    /// Human-readable description of who is answering the session.
    pub async fn status(&self, session_id: &str) -> String {
        match self {
            Router::Routing(manager) => match manager.session_state(session_id).await {
                Some(snapshot) => {
                    let mut line = format!("Active: {}", snapshot.state);
                    if !snapshot.specialist_roles.is_empty() {
                        line.push_str(&format!(
                            " (specialists in session: {})",
                            snapshot.specialist_roles.join(", ")
                        ));
                    }
                    if snapshot.has_pending_result {
                        line.push_str(" [result pending for coordinator]");
                    }
                    line
                }
                None => "No active session yet.".to_string(),
            },
            Router::Plain(manager) => {
                let chat_id = manager
                    .with_session(session_id, async |chat| chat.chat_id())
                    .await;
                match chat_id {
                    Some(id) => format!("Active: single agent, routing disabled (chat {id})"),
                    None => "Active: single agent, routing disabled".to_string(),
                }
            }
        }
    }

    pub async fn end_session(&self, session_id: &str) -> bool {
        match self {
            Router::Routing(manager) => manager.end_session(session_id).await,
            Router::Plain(manager) => manager.end_session(session_id).await,
        }
    }

    pub async fn shutdown(&self) {
        match self {
            Router::Routing(manager) => manager.shutdown().await,
            Router::Plain(manager) => manager.shutdown().await,
        }
    }
}
