//! Response types

use serde::{Deserialize, Serialize};

/// Status reported by a successful ingestion
pub const INGEST_SUCCESS_STATUS: &str = "Successfully embedded";

/// Answer returned by `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Generated answer
    pub answer: String,
    /// Citations of the chunks the answer was grounded on
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Result of `POST /ingest`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Uploaded filename
    pub filename: String,
    /// Number of chunks embedded and stored
    pub chunks_processed: usize,
    /// Human readable status
    pub status: String,
}

impl IngestResponse {
    /// Response for a completed ingestion
    pub fn success(filename: impl Into<String>, chunks_processed: usize) -> Self {
        Self {
            filename: filename.into(),
            chunks_processed,
            status: INGEST_SUCCESS_STATUS.to_string(),
        }
    }
}

/// Body of `GET /`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
