//! The function-call resolution loop.

use std::sync::Arc;

use serde_json::json;
use switchboard_tools::ToolRegistry;
use switchboard_types::{
    ApiError, Content, FunctionCall, FunctionResponse, GenerateRequest, GenerateResponse,
    GoogleSearch, Part, RoutingSignal, ToolConfig, ToolContext, ToolError, ToolOutput,
    provider::Provider, truncate_for_display,
};
use tracing::Instrument;

use crate::loop_state::{ITERATION_LIMIT_TEXT, LoopLimits, LoopState};
use crate::thinking::parse_thinking_response;

/// Result of one agent turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Text produced by the model. May be empty when a signal ended the turn.
    pub text: String,
    /// Routing signal returned by a tool, which ended the turn early.
    pub signal: Option<RoutingSignal>,
}

impl TurnOutcome {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            signal: None,
        }
    }
}

/// An LLM-backed agent with a role, instructions and a set of tools.
///
/// One instance runs one turn at a time; callers serialize access (the
/// registry and managers hold agents behind a `tokio::sync::Mutex`).
pub struct Agent {
    role: String,
    objective: String,
    context: String,
    task: Option<String>,
    provider: Arc<dyn Provider>,
    tools: ToolRegistry,
    enable_google_search: bool,
    limits: LoopLimits,
    thinking_model: bool,
}

impl Agent {
    pub fn new(
        role: impl Into<String>,
        objective: impl Into<String>,
        context: impl Into<String>,
        provider: Arc<dyn Provider>,
    ) -> Self {
        Self {
            role: role.into(),
            objective: objective.into(),
            context: context.into(),
            task: None,
            provider,
            tools: ToolRegistry::new(),
            enable_google_search: false,
            limits: LoopLimits::default(),
            thinking_model: false,
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_google_search(mut self, enabled: bool) -> Self {
        self.enable_google_search = enabled;
        self
    }

    pub fn with_limits(mut self, limits: LoopLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Post-process final answers with [`parse_thinking_response`].
    pub fn with_thinking_model(mut self, enabled: bool) -> Self {
        self.thinking_model = enabled;
        self
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn task(&self) -> Option<&str> {
        self.task.as_deref()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn tools_mut(&mut self) -> &mut ToolRegistry {
        &mut self.tools
    }

    pub fn google_search_enabled(&self) -> bool {
        self.enable_google_search
    }

    pub fn limits(&self) -> &LoopLimits {
        &self.limits
    }

    pub fn set_context(&mut self, context: impl Into<String>) {
        self.context = context.into();
    }

    /// Append a paragraph to the system context.
    pub fn append_context(&mut self, extra: &str) {
        if extra.trim().is_empty() {
            return;
        }
        if !self.context.is_empty() {
            self.context.push_str("\n\n");
        }
        self.context.push_str(extra.trim());
    }

    /// System instructions sent with every request.
    pub fn system_instruction(&self) -> String {
        let mut out = self.context.trim().to_string();
        for (label, value) in [("Role", &self.role), ("Objective", &self.objective)] {
            if value.trim().is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(&format!("{label}: {}", value.trim()));
        }
        out
    }

    /// Tool entry of a request: at most one element.
    ///
    /// Function declarations take precedence; search is only offered when no
    /// tools are registered.
    pub fn build_tool_config(&self) -> Option<Vec<ToolConfig>> {
        if !self.tools.is_empty() {
            Some(vec![ToolConfig::FunctionDeclarations(self.tools.definitions())])
        } else if self.enable_google_search {
            Some(vec![ToolConfig::GoogleSearch(GoogleSearch {})])
        } else {
            None
        }
    }

    /// Run `task` to completion with no prior history and return the final text.
    ///
    /// Never fails: model errors, tool errors and the iteration cap all end in
    /// a text answer. A routing signal ends the turn with whatever text the
    /// model produced alongside it.
    pub async fn execute(&mut self, task: impl Into<String>) -> String {
        let task = task.into();
        self.task = Some(task.clone());
        let outcome = self
            .run_turn(Vec::new(), vec![Part::text(task)], ToolContext::new(&self.role))
            .await;
        if let Some(signal) = &outcome.signal {
            tracing::debug!(
                role = %self.role,
                signal = signal.signal_type(),
                "signal ignored outside a routing session"
            );
        }
        outcome.text
    }

    /// Drive one turn of the function-call loop.
    ///
    /// `history` holds prior turns, `prompt` the parts of the new user turn.
    pub async fn run_turn(
        &self,
        history: Vec<Content>,
        prompt: Vec<Part>,
        ctx: ToolContext,
    ) -> TurnOutcome {
        let span = tracing::info_span!("agent.turn", role = %self.role);
        self.turn_loop(history, prompt, ctx).instrument(span).await
    }

    async fn turn_loop(&self, history: Vec<Content>, prompt: Vec<Part>, ctx: ToolContext) -> TurnOutcome {
        let mut state = LoopState::new(&self.limits);
        let mut request = GenerateRequest {
            context: Some(self.system_instruction()),
            history,
            prompt,
            tools: self.build_tool_config(),
        };

        loop {
            if !state.begin_model_call() {
                tracing::warn!(
                    iterations = state.iterations(),
                    phase = ?state.phase(),
                    "function-call loop hit the iteration cap"
                );
                return TurnOutcome::text(ITERATION_LIMIT_TEXT);
            }

            let response = match self.call_model(&request).await {
                Ok(response) => response,
                Err(e) => {
                    state.model_failed();
                    tracing::warn!(iteration = state.iterations(), "model call failed: {e}");
                    return TurnOutcome::text(format!("Error communicating with the model: {e}"));
                }
            };

            let GenerateResponse {
                text,
                function_call,
            } = response;
            let Some(call) = function_call else {
                state.finish();
                tracing::debug!(iterations = state.iterations(), "turn complete");
                return TurnOutcome::text(self.finalize_text(text));
            };

            state.begin_tool(&call.name);
            tracing::debug!(
                iteration = state.iterations(),
                tool = %call.name,
                args = %truncate_for_display(&call.args.to_string(), 200),
                "model requested tool"
            );

            // The first round trip folds the user prompt into history.
            if !request.prompt.is_empty() {
                let prompt = std::mem::take(&mut request.prompt);
                request.history.push(Content::user(prompt));
            }
            let mut model_parts = Vec::new();
            if !text.is_empty() {
                model_parts.push(Part::Text(text.clone()));
            }
            model_parts.push(Part::FunctionCall(call.clone()));
            request.history.push(Content::model(model_parts));

            let output = self.execute_tool(&call, ctx.clone()).await;

            if let Some(signal) = output.signal {
                state.finish();
                tracing::info!(tool = %call.name, signal = signal.signal_type(), "tool returned routing signal");
                return TurnOutcome {
                    text,
                    signal: Some(signal),
                };
            }

            request.history.push(Content::user(vec![Part::FunctionResponse(
                FunctionResponse {
                    name: call.name.clone(),
                    response: json!({ "result": output.content }),
                },
            )]));
        }
    }

    async fn call_model(&self, request: &GenerateRequest) -> Result<GenerateResponse, ApiError> {
        let call = self.provider.generate_content(request);
        match self.limits.model_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(ApiError::Timeout)),
            None => call.await,
        }
    }

    /// Run a requested tool. Every failure becomes error text for the model.
    async fn execute_tool(&self, call: &FunctionCall, ctx: ToolContext) -> ToolOutput {
        let args = if call.args.is_null() {
            json!({})
        } else {
            call.args.clone()
        };

        let run = self.tools.execute(&call.name, args, ctx);
        let result = match self.limits.tool_timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.unwrap_or_else(|_| {
                Err(ToolError::Timeout {
                    timeout_ms: limit.as_millis() as u64,
                })
            }),
            None => run.await,
        };

        match result {
            Ok(output) => {
                if output.is_error {
                    tracing::debug!(tool = %call.name, "tool reported an error");
                }
                output
            }
            Err(ToolError::UnknownTool { name }) => {
                tracing::warn!(tool = %name, "model requested unknown tool");
                ToolOutput::error(format!("Unknown tool: {name}"))
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, "tool failed: {e}");
                ToolOutput::error(format!("Error executing tool '{}': {e}", call.name))
            }
        }
    }

    fn finalize_text(&self, text: String) -> String {
        if !self.thinking_model {
            return text;
        }
        match parse_thinking_response(&text) {
            Some(parsed) => {
                tracing::debug!(steps = parsed.reasoning.len(), "extracted final answer");
                parsed.final_answer
            }
            None => text,
        }
    }
}
