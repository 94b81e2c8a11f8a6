//! Answer generation: prompts, LLM clients and the RAG chain

pub mod chain;
pub mod ollama;
pub mod prompt;

pub use chain::RagChain;
pub use ollama::OllamaClient;
pub use prompt::{PromptBuilder, NO_ANSWER};
