//! Completion provider implementations

pub mod openai;

use crate::{Completion, CompletionRequest, Result};
use async_trait::async_trait;

/// Trait for chat completion endpoints
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Run a single, non-streaming chat completion
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}
