//! Embedding and storing the chunks of an upload

use std::sync::Arc;

use crate::error::Result;
use crate::providers::{EmbeddingProvider, VectorStoreProvider};
use crate::types::Chunk;

use super::retry::RetryPolicy;

/// Embeds chunks one at a time and writes them to the vector store
#[derive(Clone)]
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStoreProvider>,
    retry: RetryPolicy,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStoreProvider>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            embedder,
            vector_store,
            retry,
        }
    }

    /// Embed and store every chunk, returning how many were stored.
    ///
    /// Stores that replace on ingest get the whole upload in one swap once
    /// every chunk is embedded; others receive each chunk as soon as it is
    /// embedded. Any chunk that cannot be stored fails the whole call.
    pub async fn ingest(&self, chunks: Vec<Chunk>) -> Result<usize> {
        let total = chunks.len();
        tracing::info!(
            "Embedding {} chunks with {} into {}",
            total,
            self.embedder.name(),
            self.vector_store.name()
        );

        if self.vector_store.replaces_on_ingest() {
            let embedder = &self.embedder;
            let mut embedded = Vec::with_capacity(total);
            for (i, mut chunk) in chunks.into_iter().enumerate() {
                let label = format!("embed chunk {}/{}", i + 1, total);
                let content = chunk.content.as_str();
                let embedding = self
                    .retry
                    .run(&label, move || embedder.embed(content))
                    .await?;
                chunk.embedding = embedding;
                embedded.push(chunk);
            }
            self.vector_store.replace_all(embedded).await?;
        } else {
            for (i, chunk) in chunks.iter().enumerate() {
                let label = format!("store chunk {}/{}", i + 1, total);
                self.retry
                    .run(&label, move || async move {
                        let embedding = self.embedder.embed(&chunk.content).await?;
                        let mut stored = chunk.clone();
                        stored.embedding = embedding;
                        self.vector_store.upsert(&stored).await
                    })
                    .await?;
            }
        }

        tracing::info!("Stored {} chunks", total);
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::error::Error;
    use crate::generation::OllamaClient;
    use crate::providers::local::{LocalVectorStore, MemoryVectorStore};
    use crate::providers::ollama::OllamaEmbedder;
    use crate::providers::VectorSearchResult;
    use crate::test_support::{plain_chunk, serve_stub, FlakyEmbedder, KeywordEmbedder};
    use async_trait::async_trait;
    use axum::{http::StatusCode, routing::post, Router};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts.iter().map(|t| plain_chunk(t, 1)).collect()
    }

    fn local_store(dir: &tempfile::TempDir) -> Arc<LocalVectorStore> {
        let path = dir.path().join("index.json");
        Arc::new(LocalVectorStore::open(path, KeywordEmbedder::DIMENSIONS).unwrap())
    }

    fn no_wait_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// Appending store whose first `failures` upserts fail with `error()`
    struct ScriptedStore {
        failures: u32,
        error: fn() -> Error,
        calls: AtomicU32,
        stored: Mutex<Vec<Chunk>>,
    }

    impl ScriptedStore {
        fn new(failures: u32, error: fn() -> Error) -> Self {
            Self {
                failures,
                error,
                calls: AtomicU32::new(0),
                stored: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VectorStoreProvider for ScriptedStore {
        async fn upsert(&self, chunk: &Chunk) -> Result<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err((self.error)());
            }
            self.stored.lock().push(chunk.clone());
            Ok(())
        }

        async fn replace_all(&self, chunks: Vec<Chunk>) -> Result<()> {
            *self.stored.lock() = chunks;
            Ok(())
        }

        async fn search(&self, _query: &[f32], _top_k: usize) -> Result<Vec<VectorSearchResult>> {
            Ok(Vec::new())
        }

        async fn reset(&self) -> Result<()> {
            self.stored.lock().clear();
            Ok(())
        }

        async fn len(&self) -> Result<usize> {
            Ok(self.stored.lock().len())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn upsert_rate_limited() -> Error {
        Error::RateLimited("HTTP 429 Too Many Requests - slow down".to_string())
    }

    fn upsert_rejected() -> Error {
        Error::vector_db("HTTP 400 Bad Request - dimension mismatch")
    }

    #[tokio::test]
    async fn test_replacing_store_gets_one_swap() {
        let store = Arc::new(MemoryVectorStore::new(KeywordEmbedder::DIMENSIONS));
        let ingestor =
            Ingestor::new(Arc::new(KeywordEmbedder), store.clone(), RetryPolicy::default());

        ingestor.ingest(chunks(&["old document"])).await.unwrap();
        let stored = ingestor
            .ingest(chunks(&["alpha text", "bravo text", "charlie text"]))
            .await
            .unwrap();

        assert_eq!(stored, 3);
        assert_eq!(store.len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_appending_store_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let store = local_store(&dir);
        let ingestor =
            Ingestor::new(Arc::new(KeywordEmbedder), store.clone(), RetryPolicy::default());

        ingestor.ingest(chunks(&["first upload"])).await.unwrap();
        ingestor.ingest(chunks(&["second upload", "more"])).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limits_are_retried_per_chunk() {
        let store = Arc::new(MemoryVectorStore::new(KeywordEmbedder::DIMENSIONS));
        let embedder = Arc::new(FlakyEmbedder::new(2));
        let ingestor = Ingestor::new(embedder.clone(), store.clone(), RetryPolicy::default());

        let stored = ingestor.ingest(chunks(&["one", "two"])).await.unwrap();

        assert_eq!(stored, 2);
        assert_eq!(embedder.calls(), 4);
        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_chunk_fails_ingestion() {
        let store = Arc::new(MemoryVectorStore::new(KeywordEmbedder::DIMENSIONS));
        store.replace_all(vec![]).await.unwrap();
        let embedder = Arc::new(FlakyEmbedder::new(10));
        let ingestor = Ingestor::new(embedder, store.clone(), RetryPolicy::default());

        let err = ingestor.ingest(chunks(&["never embedded"])).await.unwrap_err();

        assert!(matches!(err, Error::RetriesExhausted { attempts: 4, .. }));
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_upsert_recovers_after_rate_limits() {
        let store = Arc::new(ScriptedStore::new(2, upsert_rate_limited));
        let ingestor =
            Ingestor::new(Arc::new(KeywordEmbedder), store.clone(), RetryPolicy::default());
        let started = tokio::time::Instant::now();

        let stored = ingestor.ingest(chunks(&["alpha", "bravo"])).await.unwrap();

        assert_eq!(stored, 2);
        assert_eq!(store.calls(), 4);
        assert_eq!(store.len().await.unwrap(), 2);
        // 5s then 10s of backoff for the first chunk
        assert!(started.elapsed() >= Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_upsert_gives_up_after_four_attempts() {
        let store = Arc::new(ScriptedStore::new(u32::MAX, upsert_rate_limited));
        let ingestor =
            Ingestor::new(Arc::new(KeywordEmbedder), store.clone(), RetryPolicy::default());

        let err = ingestor.ingest(chunks(&["alpha", "bravo"])).await.unwrap_err();

        assert!(matches!(err, Error::RetriesExhausted { attempts: 4, .. }));
        assert_eq!(store.calls(), 4);
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_upsert_error_aborts_without_retry() {
        let store = Arc::new(ScriptedStore::new(1, upsert_rejected));
        let ingestor =
            Ingestor::new(Arc::new(KeywordEmbedder), store.clone(), RetryPolicy::default());

        let err = ingestor.ingest(chunks(&["alpha", "bravo"])).await.unwrap_err();

        assert!(matches!(err, Error::VectorDb(_)));
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_ollama_embed_is_attempted_once_per_retry() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/api/embeddings",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded")
                }
            }),
        );
        let config = LlmConfig {
            ollama_url: serve_stub(router).await,
            ..LlmConfig::default()
        };
        let client = Arc::new(OllamaClient::new(&config).unwrap());
        let embedder = Arc::new(OllamaEmbedder::new(client, KeywordEmbedder::DIMENSIONS));

        let dir = tempfile::tempdir().unwrap();
        let store = local_store(&dir);
        let ingestor = Ingestor::new(embedder, store.clone(), no_wait_retry());

        let err = ingestor.ingest(chunks(&["rate limited"])).await.unwrap_err();

        assert!(matches!(err, Error::RetriesExhausted { attempts: 4, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 4);
        assert!(store.is_empty().await.unwrap());
    }
}
