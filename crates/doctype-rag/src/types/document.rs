//! Document and chunk types with source tracking

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// An uploaded document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Filename as uploaded by the user
    pub filename: String,
    /// SHA-256 of the extracted text
    pub content_hash: String,
    /// Number of pages
    pub total_pages: Option<u32>,
    /// Number of chunks created
    pub total_chunks: u32,
    /// File size in bytes
    pub file_size: u64,
    /// Ingestion timestamp
    pub ingested_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    /// Create a new document record
    pub fn new(filename: String, content_hash: String, file_size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename,
            content_hash,
            total_pages: None,
            total_chunks: 0,
            file_size,
            ingested_at: chrono::Utc::now(),
        }
    }
}

/// Where a chunk came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSource {
    /// Uploaded filename
    pub filename: String,
    /// Page number (1-indexed)
    pub page_number: Option<u32>,
    /// Total pages in the document
    pub page_count: Option<u32>,
}

impl ChunkSource {
    /// Source info for a PDF page
    pub fn pdf(filename: String, page: u32, total_pages: u32) -> Self {
        Self {
            filename,
            page_number: Some(page),
            page_count: Some(total_pages),
        }
    }

    /// Format source for display
    pub fn format_citation(&self) -> String {
        match self.page_number {
            Some(page) => format!("{}, Page {}", self.filename, page),
            None => self.filename.clone(),
        }
    }
}

/// A chunk of text from a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Parent document ID
    pub document_id: Uuid,
    /// Text content
    pub content: String,
    /// Embedding vector, empty until embedded
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
    /// Source information
    pub source: ChunkSource,
    /// Chunk index within the document
    pub chunk_index: u32,
}

impl Chunk {
    /// Create a new, not yet embedded chunk
    pub fn new(document_id: Uuid, content: String, source: ChunkSource, chunk_index: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            content,
            embedding: Vec::new(),
            source,
            chunk_index,
        }
    }

    /// Flat metadata object stored alongside the vector in hosted indexes
    pub fn to_vector_metadata(&self) -> Value {
        let mut meta = Map::new();
        meta.insert("document_id".to_string(), json!(self.document_id.to_string()));
        meta.insert("content".to_string(), json!(self.content));
        meta.insert("source".to_string(), json!(self.source.filename));
        meta.insert("chunk_index".to_string(), json!(self.chunk_index));

        if let Some(page) = self.source.page_number {
            meta.insert("page".to_string(), json!(page));
        }
        if let Some(count) = self.source.page_count {
            meta.insert("page_count".to_string(), json!(count));
        }

        Value::Object(meta)
    }

    /// Rebuild a chunk from an index id and its stored metadata
    pub fn from_vector_metadata(id: &str, metadata: &Value) -> Option<Self> {
        let content = metadata.get("content")?.as_str()?.to_string();
        let filename = metadata
            .get("source")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let as_u32 = |key: &str| metadata.get(key).and_then(Value::as_u64).map(|v| v as u32);

        Some(Self {
            id: Uuid::parse_str(id).unwrap_or_else(|_| Uuid::new_v4()),
            document_id: metadata
                .get("document_id")
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok())
                .unwrap_or_else(Uuid::nil),
            content,
            embedding: Vec::new(),
            source: ChunkSource {
                filename,
                page_number: as_u32("page"),
                page_count: as_u32("page_count"),
            },
            chunk_index: as_u32("chunk_index").unwrap_or(0),
        })
    }
}
