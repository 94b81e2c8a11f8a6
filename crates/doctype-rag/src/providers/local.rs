//! In-process vector stores built on the flat index

use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::retrieval::FlatIndex;
use crate::types::Chunk;

use super::vector_store::{VectorSearchResult, VectorStoreProvider};

/// Ephemeral index holding only the most recent upload
pub struct MemoryVectorStore {
    index: RwLock<FlatIndex>,
}

impl MemoryVectorStore {
    /// Create an empty store for vectors of `dimensions` components
    pub fn new(dimensions: usize) -> Self {
        Self {
            index: RwLock::new(FlatIndex::new(dimensions)),
        }
    }
}

#[async_trait]
impl VectorStoreProvider for MemoryVectorStore {
    async fn upsert(&self, chunk: &Chunk) -> Result<()> {
        self.index.write().insert(chunk.clone())
    }

    async fn replace_all(&self, chunks: Vec<Chunk>) -> Result<()> {
        // build first so a bad chunk leaves the previous index in place
        let dimensions = self.index.read().dimensions();
        let fresh = FlatIndex::from_chunks(dimensions, chunks)?;
        *self.index.write() = fresh;
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorSearchResult>> {
        let results = self.index.read().search(query_embedding, top_k)?;
        Ok(results.into_iter().map(Into::into).collect())
    }

    async fn reset(&self) -> Result<()> {
        self.index.write().clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.index.read().len())
    }

    fn replaces_on_ingest(&self) -> bool {
        true
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Index persisted as JSON; uploads accumulate across restarts
pub struct LocalVectorStore {
    index: RwLock<FlatIndex>,
    path: PathBuf,
    /// Serialises file writes so the newest snapshot lands last
    write_lock: tokio::sync::Mutex<()>,
}

impl LocalVectorStore {
    /// Open the index at `path`, starting empty when there is no file yet
    pub fn open(path: impl Into<PathBuf>, dimensions: usize) -> Result<Self> {
        let path = path.into();
        let index = if path.exists() {
            let raw = std::fs::read(&path)?;
            let index: FlatIndex = serde_json::from_slice(&raw).map_err(|e| {
                Error::vector_db(format!("Corrupt index file {}: {}", path.display(), e))
            })?;

            if index.dimensions() == dimensions {
                tracing::info!("Loaded {} vectors from {}", index.len(), path.display());
                index
            } else {
                tracing::warn!(
                    "Index at {} has {} dimensions but the embedder produces {}, starting empty",
                    path.display(),
                    index.dimensions(),
                    dimensions
                );
                FlatIndex::new(dimensions)
            }
        } else {
            FlatIndex::new(dimensions)
        };

        Ok(Self {
            index: RwLock::new(index),
            path,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    async fn persist(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let json = {
            let index = self.index.read();
            serde_json::to_vec(&*index)?
        };
        write_atomic(&self.path, &json).await
    }
}

/// Write to a sibling temp file and rename over the target
async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl VectorStoreProvider for LocalVectorStore {
    async fn upsert(&self, chunk: &Chunk) -> Result<()> {
        self.index.write().insert(chunk.clone())?;
        self.persist().await
    }

    async fn replace_all(&self, chunks: Vec<Chunk>) -> Result<()> {
        let dimensions = self.index.read().dimensions();
        let fresh = FlatIndex::from_chunks(dimensions, chunks)?;
        *self.index.write() = fresh;
        self.persist().await
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorSearchResult>> {
        let results = self.index.read().search(query_embedding, top_k)?;
        Ok(results.into_iter().map(Into::into).collect())
    }

    async fn reset(&self) -> Result<()> {
        self.index.write().clear();
        self.persist().await
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.index.read().len())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkSource;
    use uuid::Uuid;

    fn embedded(content: &str, embedding: Vec<f32>) -> Chunk {
        let mut chunk = Chunk::new(
            Uuid::new_v4(),
            content.to_string(),
            ChunkSource::pdf("manual.pdf".to_string(), 4, 9),
            0,
        );
        chunk.embedding = embedding;
        chunk
    }

    #[tokio::test]
    async fn test_memory_store_replaces_wholesale() {
        let store = MemoryVectorStore::new(2);
        assert!(store.replaces_on_ingest());

        store.replace_all(vec![embedded("old", vec![1.0, 0.0])]).await.unwrap();
        store
            .replace_all(vec![embedded("new-a", vec![1.0, 0.0]), embedded("new-b", vec![0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(store.len().await.unwrap(), 2);
        let results = store.search(&[1.0, 0.0], 5).await.unwrap();
        assert!(results.iter().all(|r| r.chunk.content != "old"));
    }

    #[tokio::test]
    async fn test_memory_store_keeps_index_on_bad_replace() {
        let store = MemoryVectorStore::new(2);
        store.replace_all(vec![embedded("kept", vec![1.0, 0.0])]).await.unwrap();

        let result = store.replace_all(vec![embedded("bad", vec![1.0])]).await;
        assert!(result.is_err());
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_local_store_persists_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.json");

        {
            let store = LocalVectorStore::open(&path, 2).unwrap();
            assert!(!store.replaces_on_ingest());
            store.upsert(&embedded("first", vec![1.0, 0.0])).await.unwrap();
            store.upsert(&embedded("second", vec![0.0, 1.0])).await.unwrap();
        }

        assert!(path.exists());
        let reopened = LocalVectorStore::open(&path, 2).unwrap();
        assert_eq!(reopened.len().await.unwrap(), 2);

        let results = reopened.search(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(results[0].chunk.content, "second");
        assert_eq!(results[0].chunk.source.format_citation(), "manual.pdf, Page 4");

        reopened.reset().await.unwrap();
        let emptied = LocalVectorStore::open(&path, 2).unwrap();
        assert!(emptied.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_local_store_ignores_index_of_other_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let store = LocalVectorStore::open(&path, 2).unwrap();
        store.upsert(&embedded("flat", vec![1.0, 0.0])).await.unwrap();

        let other = LocalVectorStore::open(&path, 3).unwrap();
        assert!(other.is_empty().await.unwrap());
    }
}
