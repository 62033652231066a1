//! Provider traits for LLM backends.

use std::sync::Arc;

use crate::util::BoxFuture;
use crate::{ApiError, GenerateRequest, GenerateResponse};

/// An LLM backend that turns a request into text or a function call.
///
/// Dyn-compatible so agents work with `Arc<dyn Provider>`.
pub trait Provider: Send + Sync {
    /// Run one model call.
    fn generate_content<'a>(
        &'a self,
        request: &'a GenerateRequest,
    ) -> BoxFuture<'a, Result<GenerateResponse, ApiError>>;

    /// Provider name for logging/display (e.g., "gemini").
    fn name(&self) -> &str;
}

/// Builds providers for a given model id.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, model: &str) -> Result<Arc<dyn Provider>, ApiError>;
}
