//! Gemini `generateContent` client for Switchboard.

mod client;
mod provider;
mod retry;
mod wire;

pub use client::GeminiClient;
pub use provider::{GeminiFactory, GeminiProvider};
pub use retry::RetryConfig;
