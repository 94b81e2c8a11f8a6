//! Vector store provider trait for storing and searching embeddings

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Chunk;

/// Search result from a vector store
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    /// The matched chunk
    pub chunk: Chunk,
    /// Similarity score, higher is more similar
    pub similarity: f32,
}

impl From<crate::retrieval::SearchResult> for VectorSearchResult {
    fn from(result: crate::retrieval::SearchResult) -> Self {
        Self {
            chunk: result.chunk,
            similarity: result.similarity,
        }
    }
}

/// Trait for vector storage and similarity search
///
/// Implementations:
/// - `MemoryVectorStore`: in-process index, swapped on every upload
/// - `LocalVectorStore`: in-process index persisted to a JSON file
/// - `UpstashVectorStore`: hosted Upstash Vector index
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Insert one embedded chunk
    async fn upsert(&self, chunk: &Chunk) -> Result<()>;

    /// Replace the whole index with `chunks`
    async fn replace_all(&self, chunks: Vec<Chunk>) -> Result<()>;

    /// Most similar chunks to `query_embedding`, best first
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorSearchResult>>;

    /// Remove every vector
    async fn reset(&self) -> Result<()>;

    /// Number of vectors stored
    async fn len(&self) -> Result<usize>;

    /// Check if the store is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Whether an upload replaces the index instead of adding to it
    fn replaces_on_ingest(&self) -> bool {
        false
    }

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
