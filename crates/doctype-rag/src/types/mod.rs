//! Core types for the RAG backend

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, ChunkSource, Document};
pub use query::ChatRequest;
pub use response::{ChatResponse, HealthResponse, IngestResponse};
