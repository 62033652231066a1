//! Tool registry, closure-backed tools and routing signal tools for Switchboard.

mod function;
mod registry;
mod signal;

pub use function::FunctionTool;
pub use registry::ToolRegistry;
pub use signal::{
    END_SUB_CONVERSATION, EndSubConversationTool, REQUEST_SUB_CONVERSATION, RequestSubConversationTool,
    RoleDirectory,
};
