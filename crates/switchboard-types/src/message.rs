//! Message and request types for Gemini-style `generateContent` backends.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a conversation participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry of a conversation transcript.
///
/// Transcripts are append-only (apart from an explicit clear) and only ever
/// hold the plain-text side of a turn; tool calls made while producing a
/// reply are not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
        }
    }
}

/// One turn in the wire format: a role and its parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }
}

impl From<&Message> for Content {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            parts: vec![Part::Text(message.content.clone())],
        }
    }
}

/// A piece of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    FunctionCall(FunctionCall),
    FunctionResponse(FunctionResponse),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// A function invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// The result of a function invocation, sent back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: serde_json::Value,
}

/// A function declaration sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Marker for the backend's built-in web search capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleSearch {}

/// A tool entry of a request.
///
/// Serializes as `{"functionDeclarations": [...]}` or `{"googleSearch": {}}`.
/// A request carries at most one entry: function calling and search cannot be
/// combined in the same call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolConfig {
    FunctionDeclarations(Vec<ToolDefinition>),
    GoogleSearch(GoogleSearch),
}

/// A request to an LLM backend.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// System instructions.
    pub context: Option<String>,
    /// Prior turns, oldest first.
    pub history: Vec<Content>,
    /// Parts of the current user turn.
    pub prompt: Vec<Part>,
    pub tools: Option<Vec<ToolConfig>>,
}

impl GenerateRequest {
    /// Full list of turns: history followed by the current user turn.
    pub fn contents(&self) -> Vec<Content> {
        let mut contents = self.history.clone();
        if !self.prompt.is_empty() {
            contents.push(Content::user(self.prompt.clone()));
        }
        contents
    }

    /// Text parts of the current user turn, joined by newlines.
    pub fn prompt_text(&self) -> String {
        self.prompt
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether function declarations are part of this request.
    pub fn has_function_declarations(&self) -> bool {
        self.tools.as_ref().is_some_and(|tools| {
            tools
                .iter()
                .any(|t| matches!(t, ToolConfig::FunctionDeclarations(_)))
        })
    }

    /// Whether the search capability is part of this request.
    pub fn has_google_search(&self) -> bool {
        self.tools.as_ref().is_some_and(|tools| {
            tools
                .iter()
                .any(|t| matches!(t, ToolConfig::GoogleSearch(_)))
        })
    }
}

/// A response from an LLM backend: plain text, optionally with a function call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateResponse {
    pub text: String,
    pub function_call: Option<FunctionCall>,
}

impl GenerateResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            function_call: None,
        }
    }

    pub fn function_call(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            text: String::new(),
            function_call: Some(FunctionCall::new(name, args)),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.function_call.is_none()
    }
}
