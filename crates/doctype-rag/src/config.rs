//! Configuration for the RAG backend
//!
//! Loaded in layers: built-in defaults, then an optional TOML file, then
//! environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Vector store configuration
    pub vector_store: VectorStoreConfig,
    /// LLM configuration
    pub llm: LlmConfig,
    /// Rate-limit retry configuration
    pub retry: RetryConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Allowed CORS origins ("*" allows any)
    pub cors_origins: Vec<String>,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
    /// Directory for temporary upload files
    pub upload_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            max_upload_size: 50 * 1024 * 1024,
            upload_dir: std::env::temp_dir(),
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
    /// Seconds pdf-extract may run before falling back to lopdf
    pub extract_timeout_secs: u64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            extract_timeout_secs: 60,
        }
    }
}

/// Which embedding backend to use
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local ONNX sentence-embedding model
    #[default]
    Local,
    /// Hosted Gemini embedding API
    Gemini,
    /// Local Ollama server
    Ollama,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding backend
    pub provider: EmbeddingBackend,
    /// Sentence-transformers model for the local backend
    pub model: String,
    /// Embedding dimensions; derived from the provider when unset
    pub dimensions: Option<usize>,
    /// Maximum sequence length for local inference
    pub max_length: usize,
    /// Cache directory for downloaded models
    pub cache_dir: PathBuf,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::Local,
            model: "all-MiniLM-L6-v2".to_string(),
            dimensions: None,
            max_length: 256,
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("doctype")
                .join("models"),
        }
    }
}

impl EmbeddingConfig {
    /// Embedding dimensions for the configured provider
    pub fn effective_dimensions(&self) -> usize {
        self.dimensions.unwrap_or(match self.provider {
            EmbeddingBackend::Local => 384,
            EmbeddingBackend::Gemini => 768,
            EmbeddingBackend::Ollama => 768,
        })
    }
}

/// Which vector store to use
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// Ephemeral in-process index, replaced on every upload
    #[default]
    Memory,
    /// In-process index persisted to a file
    Local,
    /// Hosted Upstash Vector index
    Upstash,
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Vector backend
    pub backend: VectorBackend,
    /// Index file for the local backend
    pub storage_path: PathBuf,
    /// Number of chunks retrieved per question
    pub top_k: usize,
    /// Upstash REST URL
    pub upstash_url: Option<String>,
    /// Upstash REST token
    pub upstash_token: Option<String>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        let storage_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("doctype")
            .join("index.json");

        Self {
            backend: VectorBackend::Memory,
            storage_path,
            top_k: 3,
            upstash_url: None,
            upstash_token: None,
        }
    }
}

/// Which LLM to use
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// Hosted Gemini
    #[default]
    Gemini,
    /// Local Ollama server
    Ollama,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM backend
    pub provider: LlmBackend,
    /// Google API key (Gemini generation and embeddings)
    pub google_api_key: Option<String>,
    /// Gemini API base URL
    pub gemini_base_url: String,
    /// Gemini generation model
    pub gemini_model: String,
    /// Gemini embedding model
    pub gemini_embed_model: String,
    /// Ollama base URL
    pub ollama_url: String,
    /// Ollama embedding model
    pub ollama_embed_model: String,
    /// Ollama generation model
    pub ollama_generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Transport retries for the Ollama client
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmBackend::Gemini,
            google_api_key: None,
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            gemini_model: "gemini-1.5-flash".to_string(),
            gemini_embed_model: "text-embedding-004".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_embed_model: "nomic-embed-text".to_string(),
            ollama_generate_model: "llama3.2:3b".to_string(),
            temperature: 0.0, // factual answers from the document
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Rate-limit retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first rate-limited attempt
    pub max_retries: u32,
    /// Base delay, doubled on every retry
    pub base_delay_secs: f64,
    /// Upper bound of the random jitter added to each delay
    pub max_jitter_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 5.0,
            max_jitter_secs: 2.0,
        }
    }
}

impl RagConfig {
    /// Load configuration: optional TOML file, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&raw)
    }

    /// Parse TOML configuration text
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Override values from environment variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = var("HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(origins) = var("CORS_ORIGINS").or_else(|| var("FRONTEND_URL")) {
            self.server.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(dir) = var("UPLOAD_DIR") {
            self.server.upload_dir = PathBuf::from(dir);
        }

        if let Some(provider) = var("EMBEDDING_PROVIDER") {
            match provider.to_lowercase().as_str() {
                "local" => self.embeddings.provider = EmbeddingBackend::Local,
                "gemini" | "google" => self.embeddings.provider = EmbeddingBackend::Gemini,
                "ollama" => self.embeddings.provider = EmbeddingBackend::Ollama,
                other => tracing::warn!("Ignoring unknown EMBEDDING_PROVIDER '{}'", other),
            }
        }

        if let Some(backend) = var("VECTOR_BACKEND") {
            match backend.to_lowercase().as_str() {
                "memory" => self.vector_store.backend = VectorBackend::Memory,
                "local" => self.vector_store.backend = VectorBackend::Local,
                "upstash" => self.vector_store.backend = VectorBackend::Upstash,
                other => tracing::warn!("Ignoring unknown VECTOR_BACKEND '{}'", other),
            }
        }
        if let Some(path) = var("VECTOR_STORE_PATH") {
            self.vector_store.storage_path = PathBuf::from(path);
        }
        if let Some(url) = var("UPSTASH_VECTOR_REST_URL") {
            self.vector_store.upstash_url = Some(url);
        }
        if let Some(token) = var("UPSTASH_VECTOR_REST_TOKEN") {
            self.vector_store.upstash_token = Some(token);
        }

        if let Some(provider) = var("LLM_PROVIDER") {
            match provider.to_lowercase().as_str() {
                "gemini" | "google" => self.llm.provider = LlmBackend::Gemini,
                "ollama" => self.llm.provider = LlmBackend::Ollama,
                other => tracing::warn!("Ignoring unknown LLM_PROVIDER '{}'", other),
            }
        }
        if let Some(key) = var("GOOGLE_API_KEY") {
            self.llm.google_api_key = Some(key);
        }
        if let Some(url) = var("OLLAMA_URL") {
            self.llm.ollama_url = url;
        }
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than 0".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }

        let store = &self.vector_store;
        if store.backend == VectorBackend::Upstash
            && (store.upstash_url.is_none() || store.upstash_token.is_none())
        {
            return Err(Error::Config(
                "Upstash backend requires UPSTASH_VECTOR_REST_URL and UPSTASH_VECTOR_REST_TOKEN"
                    .to_string(),
            ));
        }

        let needs_google = self.llm.provider == LlmBackend::Gemini
            || self.embeddings.provider == EmbeddingBackend::Gemini;
        if needs_google && self.llm.google_api_key.is_none() {
            return Err(Error::Config("Gemini requires GOOGLE_API_KEY".to_string()));
        }

        Ok(())
    }

    /// Whether any origin may call the API
    pub fn allows_any_origin(&self) -> bool {
        self.server.cors_origins.is_empty() || self.server.cors_origins.iter().any(|o| o == "*")
    }
}
