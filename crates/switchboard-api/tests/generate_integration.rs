//! Integration tests for `GeminiClient::generate_content()`.
//!
//! Uses a raw TCP test server to return canned Gemini responses and verify
//! parsing, retries on transient errors, and fail-fast on auth errors.
//!
//! Run with: `cargo test -p switchboard-api --test generate_integration -- --ignored`

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use switchboard_api::{GeminiClient, RetryConfig};
use switchboard_types::{ApiError, GenerateRequest, Part};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn http_response(status_line: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status_line}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        body.len()
    )
}

fn http_200_text(text: &str) -> String {
    let body = serde_json::json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
    .to_string();
    http_response("200 OK", &body)
}

fn http_200_function_call() -> String {
    let body = serde_json::json!({
        "candidates": [{
            "content": {"role": "model", "parts": [
                {"functionCall": {"name": "get_weather", "args": {"city": "Porto"}}}
            ]}
        }]
    })
    .to_string();
    http_response("200 OK", &body)
}

fn http_503() -> String {
    http_response(
        "503 Service Unavailable",
        r#"{"error":{"code":503,"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#,
    )
}

fn http_403() -> String {
    http_response(
        "403 Forbidden",
        r#"{"error":{"code":403,"message":"Permission denied","status":"PERMISSION_DENIED"}}"#,
    )
}

/// Start a test TCP server that returns one pre-configured response per connection.
async fn start_test_server(responses: Vec<String>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = Arc::clone(&counter);

    tokio::spawn(async move {
        let responses = Arc::new(responses);
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let idx = counter_clone.fetch_add(1, Ordering::SeqCst);
            let responses = Arc::clone(&responses);

            tokio::spawn(async move {
                let mut buf = vec![0u8; 16384];
                let _ = socket.read(&mut buf).await;
                if idx < responses.len() {
                    let _ = socket.write_all(responses[idx].as_bytes()).await;
                    let _ = socket.flush().await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), counter)
}

fn make_client(base_url: &str) -> GeminiClient {
    GeminiClient::new("test-key", base_url)
        .unwrap()
        .with_retry_config(RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
        })
}

fn test_request() -> GenerateRequest {
    GenerateRequest {
        context: Some("You are a test.".into()),
        prompt: vec![Part::text("hello")],
        ..Default::default()
    }
}

#[tokio::test]
#[ignore]
async fn test_plain_text_response() {
    let (base_url, counter) = start_test_server(vec![http_200_text("Hi there")]).await;
    let client = make_client(&base_url);

    let response = client
        .generate_content("gemini-test", &test_request())
        .await
        .unwrap();
    assert_eq!(response.text, "Hi there");
    assert!(response.function_call.is_none());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
#[ignore]
async fn test_function_call_response() {
    let (base_url, _counter) = start_test_server(vec![http_200_function_call()]).await;
    let client = make_client(&base_url);

    let response = client
        .generate_content("gemini-test", &test_request())
        .await
        .unwrap();
    let call = response.function_call.expect("should carry a function call");
    assert_eq!(call.name, "get_weather");
    assert_eq!(call.args["city"], "Porto");
}

#[tokio::test]
#[ignore]
async fn test_retry_on_503_then_success() {
    let (base_url, counter) =
        start_test_server(vec![http_503(), http_200_text("recovered")]).await;
    let client = make_client(&base_url);

    let response = client
        .generate_content("gemini-test", &test_request())
        .await
        .unwrap();
    assert_eq!(response.text, "recovered");
    assert_eq!(counter.load(Ordering::SeqCst), 2, "1 failure + 1 success");
}

#[tokio::test]
#[ignore]
async fn test_retry_exhausted() {
    let (base_url, counter) = start_test_server(vec![http_503(), http_503(), http_503()]).await;
    let client = make_client(&base_url);

    let result = client.generate_content("gemini-test", &test_request()).await;
    assert!(matches!(result, Err(ApiError::Overloaded)), "got {result:?}");
    assert_eq!(counter.load(Ordering::SeqCst), 3, "1 attempt + 2 retries");
}

#[tokio::test]
#[ignore]
async fn test_no_retry_on_403() {
    let (base_url, counter) =
        start_test_server(vec![http_403(), http_200_text("never reached")]).await;
    let client = make_client(&base_url);

    let result = client.generate_content("gemini-test", &test_request()).await;
    assert!(matches!(result, Err(ApiError::Auth { .. })), "got {result:?}");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}
