//! HTTP client for the Gemini `generateContent` endpoint.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use switchboard_types::{ApiError, GenerateRequest, GenerateResponse};

use crate::retry::{RetryConfig, is_retryable};
use crate::wire::{RequestBody, ResponseBody};

/// The API version path segment.
const API_VERSION: &str = "v1beta";

/// Client for the Gemini REST API. Cheap to clone.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    retry_config: RetryConfig,
}

impl GeminiClient {
    /// Create a new client.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::build(api_key.into(), base_url.into(), None)
    }

    /// Create a client whose HTTP requests time out after `timeout`.
    pub fn with_timeout(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        Self::build(api_key.into(), base_url.into(), Some(timeout))
    }

    fn build(api_key: String, base_url: String, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_config: RetryConfig::default(),
        })
    }

    /// Set the retry configuration for transient errors (429, 503, 5xx, network).
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Run a `generateContent` call against `model`.
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ApiError> {
        let url = format!(
            "{}/{API_VERSION}/models/{model}:generateContent",
            self.base_url
        );

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key).map_err(|_| ApiError::Auth {
                message: "Invalid API key format".into(),
            })?,
        );

        let body = serde_json::to_string(&RequestBody::from_request(request)).map_err(|e| {
            ApiError::BadRequest {
                message: format!("Failed to serialize request: {e}"),
            }
        })?;

        let mut attempt = 0;
        loop {
            tracing::debug!(
                "POST {url} (attempt {}/{})",
                attempt + 1,
                self.retry_config.max_retries + 1
            );

            let err = match self
                .http
                .post(&url)
                .headers(headers.clone())
                .body(body.clone())
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed: ResponseBody = response
                            .json()
                            .await
                            .map_err(|e| ApiError::Parse(e.to_string()))?;
                        return parsed.into_response();
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body_text = response.text().await.unwrap_or_default();
                    classify_error(status.as_u16(), &body_text, retry_after)
                }
                Err(e) if e.is_timeout() => ApiError::Timeout,
                Err(e) => ApiError::Network(e.to_string()),
            };

            if !is_retryable(&err) || attempt >= self.retry_config.max_retries {
                return Err(err);
            }

            let retry_after = match &err {
                ApiError::RateLimited { retry_after_ms } => retry_after_ms.map(Duration::from_millis),
                _ => None,
            };
            let delay = self.retry_config.delay_for(attempt, retry_after);
            tracing::warn!(
                "Retryable Gemini error (attempt {}/{}): {err}. Retrying in {}ms...",
                attempt + 1,
                self.retry_config.max_retries,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Parse the `retry-after` header value as seconds and convert to milliseconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<f64>().ok())
        .map(|secs| (secs * 1000.0) as u64)
}

/// Classify an HTTP error response into a typed `ApiError`.
///
/// Gemini error bodies look like `{"error": {"code": 400, "message": "...", "status": "INVALID_ARGUMENT"}}`.
fn classify_error(status: u16, body: &str, retry_after: Option<u64>) -> ApiError {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: Option<ErrorDetail>,
    }
    #[derive(serde::Deserialize)]
    struct ErrorDetail {
        message: Option<String>,
        status: Option<String>,
    }

    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error);
    let api_status = detail.as_ref().and_then(|d| d.status.clone());
    let message = detail
        .and_then(|d| d.message)
        .unwrap_or_else(|| body.to_string());

    match status {
        401 | 403 => ApiError::Auth { message },
        400 if api_status.as_deref() == Some("UNAUTHENTICATED") => ApiError::Auth { message },
        400 if message.contains("API key not valid") => ApiError::Auth { message },
        400 => ApiError::BadRequest { message },
        429 => ApiError::RateLimited {
            retry_after_ms: retry_after,
        },
        503 => ApiError::Overloaded,
        _ => ApiError::Server { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_retry_after_float() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("1.5"));
        assert_eq!(parse_retry_after(&headers), Some(1500));
    }

    #[test]
    fn parse_retry_after_invalid() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn classify_invalid_key_as_auth() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        assert!(matches!(classify_error(400, body, None), ApiError::Auth { .. }));
    }

    #[test]
    fn classify_bad_request_keeps_message() {
        let body = r#"{"error":{"code":400,"message":"Invalid JSON payload","status":"INVALID_ARGUMENT"}}"#;
        match classify_error(400, body, None) {
            ApiError::BadRequest { message } => assert_eq!(message, "Invalid JSON payload"),
            other => panic!("Expected BadRequest, got {other:?}"),
        }
    }

    #[test]
    fn classify_rate_limit_and_overload() {
        match classify_error(429, "{}", Some(2000)) {
            ApiError::RateLimited { retry_after_ms } => assert_eq!(retry_after_ms, Some(2000)),
            other => panic!("Expected RateLimited, got {other:?}"),
        }
        assert!(matches!(classify_error(503, "{}", None), ApiError::Overloaded));
    }

    #[test]
    fn classify_unparseable_body_as_server_error() {
        match classify_error(500, "upstream exploded", None) {
            ApiError::Server { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "upstream exploded");
            }
            other => panic!("Expected Server, got {other:?}"),
        }
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = GeminiClient::new("k", "http://localhost:1234/").unwrap();
        assert_eq!(client.base_url, "http://localhost:1234");
    }
}
