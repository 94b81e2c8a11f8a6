//! Provider abstractions for embeddings, LLM and vector storage
//!
//! Trait objects let the server switch between local models, Ollama and
//! hosted APIs (Gemini, Upstash) from configuration.

pub mod embedding;
pub mod gemini;
pub mod llm;
pub mod local;
pub mod ollama;
pub mod onnx;
pub mod upstash;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use llm::LlmProvider;
pub use vector_store::{VectorSearchResult, VectorStoreProvider};
