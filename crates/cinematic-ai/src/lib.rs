//! cinematic-ai: chat completion client abstraction
//!
//! This crate provides the conversation turn types and a common interface for
//! requesting chat completions from an OpenAI-compatible endpoint.

pub mod error;
pub mod providers;
pub mod retry;
pub mod types;

pub use error::{Error, Result};
pub use providers::CompletionProvider;
pub use retry::RetryConfig;
pub use types::*;
