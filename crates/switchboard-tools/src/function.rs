//! FunctionTool — wraps a closure as a `Tool`.

use std::future::Future;
use std::sync::Arc;

use switchboard_types::{BoxFuture, Tool, ToolContext, ToolDefinition, ToolError, ToolOutput};

type ToolFn =
    dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<serde_json::Value, ToolError>> + Send + Sync;

/// A tool whose behavior is an arbitrary function of its JSON arguments.
///
/// The returned value is stringified before it is fed back to the model.
/// Errors are reported through `ToolError`; the agent loop turns them into
/// text for the model rather than failing the turn.
#[derive(Clone)]
pub struct FunctionTool {
    definition: ToolDefinition,
    function: Arc<ToolFn>,
}

impl FunctionTool {
    /// Create a tool from an async function.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        function: F,
    ) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, ToolError>> + Send + 'static,
    {
        Self {
            definition: ToolDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
            function: Arc::new(move |args| Box::pin(function(args))),
        }
    }

    /// Create a tool from a synchronous function.
    pub fn from_fn<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        function: F,
    ) -> Self
    where
        F: Fn(serde_json::Value) -> Result<serde_json::Value, ToolError> + Send + Sync + 'static,
    {
        let function = Arc::new(function);
        Self::new(name, description, parameters, move |args| {
            let function = Arc::clone(&function);
            async move { function(args) }
        })
    }
}

impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        let call = (self.function)(input);
        Box::pin(async move { call.await.map(ToolOutput::value) })
    }
}
