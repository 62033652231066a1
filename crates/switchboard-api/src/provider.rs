//! `Provider` implementations backed by [`GeminiClient`].

use std::sync::Arc;

use switchboard_types::provider::{Provider, ProviderFactory};
use switchboard_types::{ApiError, BoxFuture, GenerateRequest, GenerateResponse};

use crate::client::GeminiClient;

/// A Gemini model bound to a client.
#[derive(Clone)]
pub struct GeminiProvider {
    client: GeminiClient,
    model: String,
}

impl GeminiProvider {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Provider for GeminiProvider {
    fn generate_content<'a>(
        &'a self,
        request: &'a GenerateRequest,
    ) -> BoxFuture<'a, Result<GenerateResponse, ApiError>> {
        Box::pin(self.client.generate_content(&self.model, request))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Builds [`GeminiProvider`]s that share one HTTP client.
#[derive(Clone)]
pub struct GeminiFactory {
    client: GeminiClient,
}

impl GeminiFactory {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

impl ProviderFactory for GeminiFactory {
    fn create(&self, model: &str) -> Result<Arc<dyn Provider>, ApiError> {
        if model.trim().is_empty() {
            return Err(ApiError::BadRequest {
                message: "model id must not be empty".into(),
            });
        }
        Ok(Arc::new(GeminiProvider::new(self.client.clone(), model)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::new("test-key", "https://api.example.com").unwrap()
    }

    #[test]
    fn provider_name_and_model() {
        let provider = GeminiProvider::new(client(), "gemini-2.0-flash");
        assert_eq!(provider.name(), "gemini");
        assert_eq!(provider.model(), "gemini-2.0-flash");
    }

    #[test]
    fn factory_rejects_empty_model() {
        let factory = GeminiFactory::new(client());
        assert!(factory.create("gemini-2.0-flash").is_ok());
        assert!(matches!(factory.create("  "), Err(ApiError::BadRequest { .. })));
    }
}
