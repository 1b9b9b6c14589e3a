// file: src/llm/mod.rs
// description: llm helper module exports
// reference: internal module structure

pub mod cache;
pub mod client;
pub mod provider;

pub use cache::ResponseCache;
pub use client::LlmClient;
pub use provider::{ChatSettings, GeminiAuth, GeminiSettings, LlmProvider};
