//! LLM provider trait for answer generation

use async_trait::async_trait;

use crate::error::Result;

/// Trait for text generation from a fully rendered prompt
///
/// Implementations:
/// - `GeminiLlm`: Google Gemini (gemini-1.5-flash)
/// - `OllamaLlm`: local Ollama server
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for `prompt`
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// The model being used
    fn model(&self) -> &str;
}
