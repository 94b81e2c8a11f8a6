//! Application state for the RAG server

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{EmbeddingBackend, LlmBackend, RagConfig, VectorBackend};
use crate::error::Result;
use crate::generation::{OllamaClient, RagChain};
use crate::ingestion::{IngestPipeline, PdfLoader};
use crate::processing::{Ingestor, RetryPolicy};
use crate::providers::{
    gemini::{GeminiEmbedder, GeminiLlm},
    local::{LocalVectorStore, MemoryVectorStore},
    ollama::{OllamaEmbedder, OllamaLlm},
    onnx::OnnxEmbedder,
    upstash::UpstashVectorStore,
    EmbeddingProvider, LlmProvider, VectorStoreProvider,
};
use crate::types::Document;

fn shared_ollama(
    slot: &mut Option<Arc<OllamaClient>>,
    config: &RagConfig,
) -> Result<Arc<OllamaClient>> {
    if let Some(client) = slot {
        return Ok(Arc::clone(client));
    }
    let client = Arc::new(OllamaClient::new(&config.llm)?);
    *slot = Some(Arc::clone(&client));
    Ok(client)
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store_provider: Arc<dyn VectorStoreProvider>,
    llm_provider: Arc<dyn LlmProvider>,
    pipeline: Arc<IngestPipeline>,
    ingestor: Ingestor,
    chain: RagChain,
    /// Most recently ingested document
    last_document: RwLock<Option<Document>>,
    ready: RwLock<bool>,
}

impl AppState {
    /// Build every provider from configuration
    pub async fn from_config(config: RagConfig) -> Result<Self> {
        tracing::info!(
            "Initializing providers (embeddings: {:?}, vectors: {:?}, llm: {:?})",
            config.embeddings.provider,
            config.vector_store.backend,
            config.llm.provider
        );

        // one Ollama client serves both embeddings and generation
        let mut ollama = None;

        let dimensions = config.embeddings.effective_dimensions();
        let embedding_provider: Arc<dyn EmbeddingProvider> = match config.embeddings.provider {
            EmbeddingBackend::Local => Arc::new(OnnxEmbedder::new(&config.embeddings).await?),
            EmbeddingBackend::Gemini => Arc::new(GeminiEmbedder::new(&config.llm, dimensions)?),
            EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::new(
                shared_ollama(&mut ollama, &config)?,
                dimensions,
            )),
        };

        let dimensions = embedding_provider.dimensions();
        let vector_store_provider: Arc<dyn VectorStoreProvider> =
            match config.vector_store.backend {
                VectorBackend::Memory => Arc::new(MemoryVectorStore::new(dimensions)),
                VectorBackend::Local => Arc::new(LocalVectorStore::open(
                    config.vector_store.storage_path.clone(),
                    dimensions,
                )?),
                VectorBackend::Upstash => Arc::new(UpstashVectorStore::from_config(
                    &config.vector_store,
                    config.llm.timeout_secs,
                )?),
            };

        let llm_provider: Arc<dyn LlmProvider> = match config.llm.provider {
            LlmBackend::Gemini => Arc::new(GeminiLlm::new(&config.llm)?),
            LlmBackend::Ollama => Arc::new(OllamaLlm::new(shared_ollama(&mut ollama, &config)?)),
        };

        tracing::info!(
            "Providers ready: {} embeddings ({} dims), {} vector store, {} / {}",
            embedding_provider.name(),
            dimensions,
            vector_store_provider.name(),
            llm_provider.name(),
            llm_provider.model()
        );

        Ok(Self::from_providers(
            config,
            embedding_provider,
            vector_store_provider,
            llm_provider,
        ))
    }

    /// Assemble state around already constructed providers
    pub fn from_providers(
        config: RagConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store_provider: Arc<dyn VectorStoreProvider>,
        llm_provider: Arc<dyn LlmProvider>,
    ) -> Self {
        let loader = PdfLoader::with_timeout(Duration::from_secs(
            config.chunking.extract_timeout_secs.max(1),
        ));
        let pipeline = Arc::new(
            IngestPipeline::new(config.chunking.chunk_size, config.chunking.chunk_overlap)
                .with_loader(loader),
        );
        let ingestor = Ingestor::new(
            Arc::clone(&embedding_provider),
            Arc::clone(&vector_store_provider),
            RetryPolicy::from_config(&config.retry),
        );
        let chain = RagChain::new(
            Arc::clone(&embedding_provider),
            Arc::clone(&vector_store_provider),
            Arc::clone(&llm_provider),
            config.vector_store.top_k,
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                embedding_provider,
                vector_store_provider,
                llm_provider,
                pipeline,
                ingestor,
                chain,
                last_document: RwLock::new(None),
                ready: RwLock::new(true),
            }),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedding_provider
    }

    pub fn vector_store_provider(&self) -> &Arc<dyn VectorStoreProvider> {
        &self.inner.vector_store_provider
    }

    pub fn llm_provider(&self) -> &Arc<dyn LlmProvider> {
        &self.inner.llm_provider
    }

    /// PDF loading and chunking
    pub fn pipeline(&self) -> &Arc<IngestPipeline> {
        &self.inner.pipeline
    }

    /// Embedding and storage of chunks
    pub fn ingestor(&self) -> &Ingestor {
        &self.inner.ingestor
    }

    /// Question answering
    pub fn chain(&self) -> &RagChain {
        &self.inner.chain
    }

    pub fn last_document(&self) -> Option<Document> {
        self.inner.last_document.read().clone()
    }

    pub fn set_last_document(&self, document: Document) {
        *self.inner.last_document.write() = Some(document);
    }

    /// Check if ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
