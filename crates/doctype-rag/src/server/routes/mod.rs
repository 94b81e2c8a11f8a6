//! API routes for the RAG server

pub mod chat;
pub mod ingest;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::server::state::AppState;
use crate::types::HealthResponse;

/// Body of `GET /`
pub const RUNNING_STATUS: &str = "Doctype.io is running 🚀";

/// Build all routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/ready", get(readiness))
        .route("/info", get(info))
        // larger body limit for PDF uploads
        .route(
            "/ingest",
            post(ingest::ingest_document).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/chat", post(chat::chat))
}

/// Liveness check
async fn root() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: RUNNING_STATUS.to_string(),
    })
}

/// Readiness check
async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Service info and active backends
async fn info(State(state): State<AppState>) -> Json<Value> {
    let indexed = state.vector_store_provider().len().await.ok();
    let document = state.last_document().map(|doc| {
        json!({
            "filename": doc.filename,
            "pages": doc.total_pages,
            "chunks": doc.total_chunks,
            "ingested_at": doc.ingested_at,
        })
    });

    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "embeddings": {
            "provider": state.embedding_provider().name(),
            "dimensions": state.embedding_provider().dimensions(),
        },
        "vector_store": {
            "provider": state.vector_store_provider().name(),
            "vectors": indexed,
        },
        "llm": {
            "provider": state.llm_provider().name(),
            "model": state.llm_provider().model(),
        },
        "last_document": document,
        "endpoints": {
            "GET /": "Liveness check",
            "GET /ready": "Readiness check",
            "POST /ingest": "Upload a PDF (multipart field 'file')",
            "POST /chat": "Ask a question about the uploaded document",
        }
    }))
}
