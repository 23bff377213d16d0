//! LLM provider trait for chat completion

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::Result;
use crate::types::Message;

/// Fragments of a streamed completion, in arrival order
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// Trait for chat-style answer generation
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server (`/api/chat`)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate the full reply for a role-tagged conversation
    async fn complete(&self, messages: &[Message]) -> Result<String>;

    /// Start a streamed reply. Dropping the returned stream abandons the upstream call.
    async fn stream(&self, messages: &[Message]) -> Result<FragmentStream>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
