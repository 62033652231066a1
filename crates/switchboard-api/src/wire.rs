//! Gemini wire format: request bodies and response parsing.

use serde::{Deserialize, Serialize};
use switchboard_types::{
    ApiError, Content, FunctionCall, GenerateRequest, GenerateResponse, Part, ToolConfig,
};

/// Request body for `models/{model}:generateContent`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RequestBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemInstruction>,
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolConfig>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SystemInstruction {
    pub parts: Vec<Part>,
}

impl RequestBody {
    pub fn from_request(request: &GenerateRequest) -> Self {
        let system_instruction = request
            .context
            .as_ref()
            .filter(|c| !c.trim().is_empty())
            .map(|c| SystemInstruction {
                parts: vec![Part::text(c.clone())],
            });

        Self {
            system_instruction,
            contents: request.contents(),
            tools: request.tools.clone().filter(|t| !t.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResponseBody {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

/// Response parts are parsed loosely: the backend may attach extra keys
/// (thought signatures, citations) that requests never send.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    function_call: Option<FunctionCall>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl ResponseBody {
    /// Collapse the first candidate into text plus an optional function call.
    ///
    /// Text parts are concatenated; only the first function call is kept.
    pub fn into_response(self) -> Result<GenerateResponse, ApiError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ApiError::Blocked { reason });
        }

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(ApiError::Parse("response contained no candidates".into()));
        };

        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        if parts.is_empty() {
            if let Some(reason) = candidate.finish_reason.filter(|r| r != "STOP") {
                return Err(ApiError::Blocked { reason });
            }
        }

        let mut text = String::new();
        let mut function_call = None;
        for part in parts {
            if part.thought {
                continue;
            }
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if function_call.is_none() {
                function_call = part.function_call;
            }
        }

        Ok(GenerateResponse {
            text,
            function_call,
        })
    }
}
